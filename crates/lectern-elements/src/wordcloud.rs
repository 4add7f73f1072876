//! Word cloud fed by free-text submissions.
//!
//! Users and admins submit single words; words are trimmed and lowercased
//! before counting. Every few seconds the element pushes a
//! `{"Labels": [...], "Data": [...], "Update": n}` payload on both data
//! channels. `Data` holds log-scaled weights in `1..=36`; `Update` changes
//! only when a word was added, so clients can skip redundant redraws.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use lectern_core::{
    ConfigDescriptor, DataChannels, DataElement, Element, ElementChannels, ElementError,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::html::escape_html;
use crate::worker::{WorkerHandle, interval_after};

/// Registered name.
pub const NAME: &str = "Wordcloud";

const UPDATE_PERIOD: Duration = Duration::from_secs(5);
const MAX_WEIGHT: f64 = 36.0;

const CONFIG_HTML: &str = r#"<h1>Wordcloud</h1>
<label for="wc_title">Title:</label> <input class="fullwidth" type="text" id="wc_title" autocomplete="off">
<p><button onclick="sendActivate('Wordcloud', document.getElementById('wc_title').value)">Activate</button></p>"#;

/// Payload pushed on the data channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloudUpdate {
    /// Distinct words, sorted.
    pub labels: Vec<String>,
    /// Display weight per label.
    pub data: Vec<u64>,
    /// Number of accepted submissions so far.
    pub update: u64,
}

#[derive(Debug, Default)]
struct Cloud {
    words: BTreeMap<String, u64>,
    update: u64,
}

impl Cloud {
    fn add(&mut self, raw: &str) -> bool {
        let word = raw.trim().to_lowercase();
        if word.is_empty() {
            return false;
        }
        *self.words.entry(word).or_insert(0) += 1;
        self.update += 1;
        true
    }

    fn snapshot(&self) -> CloudUpdate {
        let counts: Vec<u64> = self.words.values().copied().collect();
        CloudUpdate {
            labels: self.words.keys().cloned().collect(),
            data: scale_weights(&counts),
            update: self.update,
        }
    }
}

/// Map raw counts onto `1..=36` on a log2 scale relative to the maximum.
///
/// Counts of 0 or 1 are treated as 2 so that `log2` never yields zero.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_weights(counts: &[u64]) -> Vec<u64> {
    let max = counts.iter().copied().max().unwrap_or(0).max(2);
    let factor = MAX_WEIGHT / (max as f64).log2();
    counts
        .iter()
        .map(|&n| {
            let weight = ((n.max(2) as f64).log2() * factor) as u64;
            weight.max(1)
        })
        .collect()
}

fn page(title: &str) -> String {
    format!(
        r#"<h1>{title}</h1>
<div style="height: 40vh; width: 80vw;"><canvas id="wc_canvas"></canvas></div>
<input class="fullwidth" type="text" id="wc_input" autocomplete="off" maxlength="25">
<p><button onclick="sendData('Wordcloud', document.getElementById('wc_input').value); document.getElementById('wc_input').value = ''">Submit</button></p>
<script>
var wcUpdate = -1;
data_function = function(b) {{
  var data = JSON.parse(b);
  if (wcUpdate != data.Update) {{
    wcUpdate = data.Update;
    drawWordcloud('wc_canvas', data.Labels, data.Data);
  }}
}};
</script>
"#,
        title = escape_html(title)
    )
}

/// Word cloud element.
#[derive(Debug, Default)]
pub struct Wordcloud {
    channels: Option<ElementChannels>,
    data: Option<DataChannels>,
    worker: WorkerHandle,
    cloud: Arc<Mutex<Cloud>>,
    html: String,
}

impl Wordcloud {
    /// Create an unwired instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Element for Wordcloud {
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
        let (Some(channels), Some(data)) = (self.channels.take(), self.data.take()) else {
            return Err(ElementError::NotWired);
        };
        self.html = page(payload);
        *self.cloud.lock() = Cloud::default();
        let _ = channels.admin_html.try_send(self.html.clone());
        let _ = channels.user_html.try_send(self.html.clone());
        drop(tokio::spawn(run_cloud(
            channels,
            data,
            Arc::clone(&self.cloud),
            self.worker.start(),
        )));
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

    fn as_data_element(&mut self) -> Option<&mut dyn DataElement> {
        Some(self)
    }
}

impl DataElement for Wordcloud {
    fn wire_data(&mut self, channels: DataChannels) {
        self.data = Some(channels);
    }
}

async fn run_cloud(
    channels: ElementChannels,
    data: DataChannels,
    cloud: Arc<Mutex<Cloud>>,
    token: CancellationToken,
) {
    let ElementChannels {
        admin_html: _admin_html,
        user_html: _user_html,
        mut admin_input,
        mut user_input,
    } = channels;
    let mut ticker = interval_after(UPDATE_PERIOD);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            Some(word) = admin_input.recv() => {
                let _ = cloud.lock().add(&word);
            }
            Some(word) = user_input.recv() => {
                let _ = cloud.lock().add(&word);
            }
            _ = ticker.tick() => {
                let snapshot = cloud.lock().snapshot();
                let payload = match serde_json::to_string(&snapshot) {
                    Ok(payload) => payload,
                    Err(error) => {
                        tracing::warn!(element = NAME, %error, "failed to encode word cloud update");
                        continue;
                    }
                };
                if data.admin_data.send(payload.clone()).await.is_err()
                    || data.user_data.send(payload).await.is_err()
                {
                    break;
                }
            }
        }
    }
}
