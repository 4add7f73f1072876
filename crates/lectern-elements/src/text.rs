//! Static Markdown text shown to everyone.

use lectern_core::{ConfigDescriptor, Element, ElementChannels, ElementError};

use crate::html::render_markdown;
use crate::worker::{WorkerHandle, spawn_discard};

/// Registered name.
pub const NAME: &str = "Text";

const CONFIG_HTML: &str = r#"<h1>Text</h1>
<textarea class="fullwidth" id="text_textarea" rows="4"></textarea>
<p><button onclick="sendActivate('Text', document.getElementById('text_textarea').value)">Activate</button></p>"#;

/// Renders the activation payload as Markdown for both roles.
#[derive(Debug, Default)]
pub struct Text {
    channels: Option<ElementChannels>,
    worker: WorkerHandle,
    html: String,
}

impl Text {
    /// Create an unwired instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Element for Text {
    fn config_descriptor(&self) -> ConfigDescriptor {
        ConfigDescriptor {
            name: NAME.to_string(),
            html: CONFIG_HTML.to_string(),
        }
    }

    fn wire(&mut self, channels: ElementChannels) {
        self.channels = Some(channels);
    }

    fn activate(&mut self, payload: &str) -> Result<(), ElementError> {
        let channels = self.channels.take().ok_or(ElementError::NotWired)?;
        self.html = render_markdown(payload);
        let _ = channels.admin_html.try_send(self.html.clone());
        let _ = channels.user_html.try_send(self.html.clone());
        spawn_discard(channels, self.worker.start(), NAME);
        Ok(())
    }

    fn deactivate(&mut self) {
        self.worker.stop();
    }

    fn last_admin_html(&self) -> String {
        self.html.clone()
    }

    fn last_user_html(&self) -> String {
        self.html.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn both_roles_see_rendered_text() {
        let mut text = Text::new();
        let (channels, mut ports) = ElementChannels::pair(4);
        text.wire(channels);
        text.activate("# Welcome\nto the *lecture*").unwrap();

        let admin = ports.admin_html.recv().await.unwrap();
        let user = ports.user_html.recv().await.unwrap();
        assert_eq!(admin, user);
        assert!(admin.contains("<h1>Welcome</h1>"));
        assert!(admin.contains("<em>lecture</em>"));
        assert_eq!(text.last_admin_html(), admin);
        assert_eq!(text.last_user_html(), user);
        text.deactivate();
    }

    #[test]
    fn snapshot_is_empty_before_activation() {
        let text = Text::new();
        assert!(text.last_user_html().is_empty());
    }
}
