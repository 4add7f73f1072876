//! Empty display.

use lectern_core::{ConfigDescriptor, Element, ElementChannels, ElementError};

use crate::worker::{WorkerHandle, spawn_discard};

/// Registered name.
pub const NAME: &str = "Blank";

const CONFIG_HTML: &str = r#"<h1>Blank</h1>
<p><button onclick="sendActivate('Blank', '')">Activate</button></p>"#;

/// Clears the admin and user views; ignores all input.
#[derive(Debug, Default)]
pub struct Blank {
    channels: Option<ElementChannels>,
    worker: WorkerHandle,
}

impl Blank {
    /// Create an unwired instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Element for Blank {
    fn config_descriptor(&self) -> ConfigDescriptor {
        ConfigDescriptor {
            name: NAME.to_string(),
            html: CONFIG_HTML.to_string(),
        }
    }

    fn wire(&mut self, channels: ElementChannels) {
        self.channels = Some(channels);
    }

    fn activate(&mut self, _payload: &str) -> Result<(), ElementError> {
        let channels = self.channels.take().ok_or(ElementError::NotWired)?;
        let _ = channels.admin_html.try_send(String::new());
        let _ = channels.user_html.try_send(String::new());
        spawn_discard(channels, self.worker.start(), NAME);
        Ok(())
    }

    fn deactivate(&mut self) {
        self.worker.stop();
    }

    fn last_admin_html(&self) -> String {
        String::new()
    }

    fn last_user_html(&self) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activation_clears_both_views() {
        let mut blank = Blank::new();
        let (channels, mut ports) = ElementChannels::pair(4);
        blank.wire(channels);
        blank.activate("ignored").unwrap();

        assert_eq!(ports.admin_html.recv().await.unwrap(), "");
        assert_eq!(ports.user_html.recv().await.unwrap(), "");
        assert!(blank.worker.is_running());

        blank.deactivate();
        assert!(!blank.worker.is_running());
    }

    #[test]
    fn activate_without_wiring_fails() {
        let mut blank = Blank::new();
        assert!(matches!(blank.activate(""), Err(ElementError::NotWired)));
    }
}
