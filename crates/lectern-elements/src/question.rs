//! Single-choice poll.
//!
//! Activation payload: `{"q": "<question>", "1": "<answer>", ..., "9": "<answer>"}`.
//! Empty answers are skipped; at least one answer and a question are required.
//! Users send the zero-based answer index; an admin sends `close` to finish
//! the poll, after which both roles see the result.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use lectern_core::{ConfigDescriptor, Downloadable, Element, ElementChannels, ElementError};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::html::escape_html;
use crate::worker::{WorkerHandle, interval_after};

/// Registered name.
pub const NAME: &str = "Question";

const MAX_ANSWERS: usize = 9;
const ADMIN_REFRESH: Duration = Duration::from_secs(1);

const CONFIG_HTML: &str = r#"<h1>Question</h1>
<p>Question: <input id="Question" type="text"></p>
<p><input id="Question_1" type="text"> <input id="Question_2" type="text"> <input id="Question_3" type="text"></p>
<p><input id="Question_4" type="text"> <input id="Question_5" type="text"> <input id="Question_6" type="text"></p>
<p><input id="Question_7" type="text"> <input id="Question_8" type="text"> <input id="Question_9" type="text"></p>
<p><button onclick="sendActivate('Question', JSON.stringify(Object.fromEntries([['q','Question'],['1','Question_1'],['2','Question_2'],['3','Question_3'],['4','Question_4'],['5','Question_5'],['6','Question_6'],['7','Question_7'],['8','Question_8'],['9','Question_9']].map(([k,id])=>[k,document.getElementById(id).value]))))">Activate</button></p>"#;

/// Exported poll result.
#[derive(Debug, Serialize)]
struct PollResult<'a> {
    question: &'a str,
    answers: &'a [String],
    counts: &'a [u64],
    submitted: u64,
}

#[derive(Debug, Default)]
struct Poll {
    question: String,
    answers: Vec<String>,
    counts: Vec<u64>,
    submitted: u64,
    changed: bool,
    finished: bool,
}

impl Poll {
    fn from_payload(payload: &str) -> Result<Self, ElementError> {
        let mut input: HashMap<String, String> = serde_json::from_str(payload)?;
        let question = input.remove("q").unwrap_or_default();
        if question.is_empty() {
            return Err(ElementError::Incomplete("no question found".into()));
        }
        let answers: Vec<String> = (1..=MAX_ANSWERS)
            .filter_map(|i| input.remove(&i.to_string()))
            .filter(|a| !a.is_empty())
            .collect();
        if answers.is_empty() {
            return Err(ElementError::Incomplete("no answers found".into()));
        }
        Ok(Self {
            question,
            counts: vec![0; answers.len()],
            answers,
            ..Self::default()
        })
    }

    /// Count one submission; returns whether it was accepted.
    fn record(&mut self, raw: &str) -> bool {
        let Ok(index) = raw.trim().parse::<usize>() else {
            return false;
        };
        let Some(count) = self.counts.get_mut(index) else {
            return false;
        };
        *count += 1;
        self.submitted += 1;
        self.changed = true;
        true
    }

    /// Finish the poll; returns `false` if it was already finished.
    fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.finished, true)
    }

    fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn user_page(&self) -> String {
        let mut html = format!("<h1>{}</h1>\n<table>\n", escape_html(&self.question));
        for (i, answer) in self.answers.iter().enumerate() {
            let _ = writeln!(
                html,
                "<tr><td id=\"Question_cell_{i}\">{}</td><td><button class=\"Question_button\" \
                 onclick=\"sendData('Question','{i}');document.querySelectorAll('.Question_button')\
                 .forEach(b=>b.disabled=true)\">Submit</button></td></tr>",
                escape_html(answer)
            );
        }
        html.push_str("</table>\n");
        html
    }

    fn admin_page(&self) -> String {
        let mut html = format!("<h1>{}</h1>\n<table>\n", escape_html(&self.question));
        for (answer, count) in self.answers.iter().zip(&self.counts) {
            let _ = writeln!(html, "<tr><td>{}</td><td>{count}</td></tr>", escape_html(answer));
        }
        let _ = writeln!(
            html,
            "<tr><td><em>Submitted</em></td><td><em>{}</em></td></tr>",
            self.submitted
        );
        html.push_str("</table>\n<p><button onclick=\"sendData('Question', 'close')\">Finish</button></p>\n");
        html
    }

    fn result_page(&self) -> String {
        let mut html = format!(
            "<h1>{}</h1>\n<table class=\"Question_result\">\n",
            escape_html(&self.question)
        );
        for (answer, count) in self.answers.iter().zip(&self.counts) {
            let percent = if self.submitted == 0 {
                0
            } else {
                count * 100 / self.submitted
            };
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{count}</td><td><meter min=\"0\" max=\"100\" value=\"{percent}\">{percent}%</meter></td></tr>",
                escape_html(answer)
            );
        }
        html.push_str("</table>\n");
        html
    }

    fn admin_view(&self) -> String {
        if self.finished {
            self.result_page()
        } else {
            self.admin_page()
        }
    }

    fn user_view(&self) -> String {
        if self.finished {
            self.result_page()
        } else {
            self.user_page()
        }
    }

    fn export(&self) -> Vec<u8> {
        let result = PollResult {
            question: &self.question,
            answers: &self.answers,
            counts: &self.counts,
            submitted: self.submitted,
        };
        serde_json::to_vec(&result).unwrap_or_else(|e| e.to_string().into_bytes())
    }
}

/// Single-choice poll with a live admin tally.
#[derive(Debug, Default)]
pub struct Question {
    channels: Option<ElementChannels>,
    worker: WorkerHandle,
    poll: Arc<Mutex<Poll>>,
}

impl Question {
    /// Create an unwired instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Element for Question {
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
        let poll = Poll::from_payload(payload)?;
        let channels = self.channels.take().ok_or(ElementError::NotWired)?;
        let _ = channels.user_html.try_send(poll.user_page());
        let _ = channels.admin_html.try_send(poll.admin_page());
        *self.poll.lock() = poll;
        drop(tokio::spawn(run_poll(
            channels,
            Arc::clone(&self.poll),
            self.worker.start(),
        )));
        Ok(())
    }

    fn deactivate(&mut self) {
        self.worker.stop();
    }

    fn last_admin_html(&self) -> String {
        self.poll.lock().admin_view()
    }

    fn last_user_html(&self) -> String {
        self.poll.lock().user_view()
    }

    fn as_downloadable(&self) -> Option<&dyn Downloadable> {
        Some(self)
    }
}

impl Downloadable for Question {
    fn export_result(&self) -> Vec<u8> {
        self.poll.lock().export()
    }
}

async fn run_poll(channels: ElementChannels, poll: Arc<Mutex<Poll>>, token: CancellationToken) {
    let ElementChannels {
        admin_html,
        user_html,
        mut admin_input,
        mut user_input,
    } = channels;
    let mut refresh = interval_after(ADMIN_REFRESH);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            Some(command) = admin_input.recv() => {
                if command.trim() != "close" {
                    continue;
                }
                let result = {
                    let mut poll = poll.lock();
                    poll.close().then(|| poll.result_page())
                };
                if let Some(page) = result {
                    if admin_html.send(page.clone()).await.is_err()
                        || user_html.send(page).await.is_err()
                    {
                        break;
                    }
                }
            }
            Some(answer) = user_input.recv() => {
                if !poll.lock().record(&answer) {
                    tracing::debug!(element = NAME, answer = %answer, "ignoring invalid answer");
                }
            }
            _ = refresh.tick() => {
                let page = {
                    let mut poll = poll.lock();
                    (poll.take_changed() && !poll.finished).then(|| poll.admin_page())
                };
                if let Some(page) = page {
                    if admin_html.send(page).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
