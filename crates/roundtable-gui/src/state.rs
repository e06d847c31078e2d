use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use roundtable_core::{
    AgentRole, ConfigLoader, ResearchRecord, ResearchSummary, ResearchWorkflow,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{self as stream, Stream, StreamExt};
use tracing::warn;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    service: Arc<ResearchService>,
    assets_dir: Arc<PathBuf>,
    gui_enabled: bool,
    auth_token: Option<Arc<String>>,
}

impl AppState {
    pub fn try_new(config: &AppConfig) -> Result<Self> {
        let core_config = ConfigLoader::load(config.core_config.clone())?;
        let workflow = ResearchWorkflow::new(core_config)?;
        Ok(Self::with_workflow(config, workflow))
    }

    /// Build around a prepared workflow (tests inject a scripted model).
    pub fn with_workflow(config: &AppConfig, workflow: ResearchWorkflow) -> Self {
        Self {
            service: Arc::new(ResearchService::new(workflow)),
            assets_dir: Arc::new(config.assets_dir.clone()),
            gui_enabled: config.gui_enabled,
            auth_token: config
                .auth_token
                .as_ref()
                .map(|token| Arc::new(token.to_string())),
        }
    }

    pub fn service(&self) -> Arc<ResearchService> {
        self.service.clone()
    }

    pub fn assets_dir(&self) -> Arc<PathBuf> {
        self.assets_dir.clone()
    }

    pub fn gui_enabled(&self) -> bool {
        self.gui_enabled
    }

    pub fn auth_token(&self) -> Option<Arc<String>> {
        self.auth_token.clone()
    }
}

/// Runs research sessions on behalf of the dashboard.
///
/// The workflow sits behind a mutex: one conversation at a time, exactly the
/// model the session store supports. The run registry and event streams are
/// shared so status polling never touches the workflow lock.
pub struct ResearchService {
    workflow: Arc<Mutex<ResearchWorkflow>>,
    runs: Arc<DashMap<String, RunStatus>>,
    streams: Arc<DashMap<String, broadcast::Sender<RunEvent>>>,
}

impl ResearchService {
    pub fn new(workflow: ResearchWorkflow) -> Self {
        Self {
            workflow: Arc::new(Mutex::new(workflow)),
            runs: Arc::new(DashMap::new()),
            streams: Arc::new(DashMap::new()),
        }
    }

    /// Start a research run in the background and return its id.
    pub fn start_run(&self, topic: String, instructions: String) -> String {
        let run_id = Uuid::new_v4().to_string();

        let sender = self
            .streams
            .entry(run_id.clone())
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(32);
                tx
            })
            .clone();
        let _ = sender.send(RunEvent::started(&topic));

        self.runs.insert(
            run_id.clone(),
            RunStatus {
                run_id: run_id.clone(),
                topic: topic.clone(),
                state: RunState::Running,
                error: None,
            },
        );
        telemetry::run_started(&run_id, &topic);

        let workflow = self.workflow.clone();
        let runs = self.runs.clone();
        let streams = self.streams.clone();
        let run_id_for_task = run_id.clone();

        tokio::spawn(async move {
            // Runs serialize here; a queued run waits for the lock.
            let mut workflow = workflow.lock().await;
            workflow.reset();
            let record = workflow.conduct_research(&topic, &instructions).await;
            drop(workflow);

            let (status, event) = match &record {
                ResearchRecord::Completed(_) => {
                    telemetry::run_completed(&run_id_for_task);
                    (
                        RunStatus {
                            run_id: run_id_for_task.clone(),
                            topic: topic.clone(),
                            state: RunState::Completed,
                            error: None,
                        },
                        RunEvent::completed(&record),
                    )
                }
                ResearchRecord::Failed(failed) => {
                    telemetry::run_failed(&run_id_for_task, &failed.error);
                    (
                        RunStatus {
                            run_id: run_id_for_task.clone(),
                            topic: topic.clone(),
                            state: RunState::Failed,
                            error: Some(failed.error.clone()),
                        },
                        RunEvent::failed(&failed.error),
                    )
                }
            };

            runs.insert(run_id_for_task.clone(), status);
            let _ = sender.send(event);
            streams.remove(&run_id_for_task);
        });

        run_id
    }

    pub fn status(&self, run_id: &str) -> Option<RunStatus> {
        self.runs.get(run_id).map(|status| status.value().clone())
    }

    pub fn event_stream(&self, run_id: &str) -> Option<SseStream> {
        if let Some(status) = self.runs.get(run_id) {
            match status.value().state {
                RunState::Completed | RunState::Failed => {
                    // The run already finished; replay a terminal event.
                    let event = RunEvent::from_status(status.value()).into_sse_event();
                    let stream = stream::iter(vec![Result::<Event, Infallible>::Ok(event)]);
                    return Some(Box::pin(stream));
                }
                RunState::Running => {}
            }
        }

        self.streams.get(run_id).map(|sender| {
            let rx = sender.subscribe();
            let stream = BroadcastStream::new(rx).filter_map(|event| match event {
                Ok(event) => Some(Result::<Event, Infallible>::Ok(event.into_sse_event())),
                Err(err) => {
                    warn!(error = %err, "run event stream closed");
                    None
                }
            });
            Box::pin(stream) as SseStream
        })
    }

    /// Stored run summaries, most recent first.
    pub async fn history(&self) -> Vec<ResearchSummary> {
        let workflow = self.workflow.lock().await;
        workflow
            .history()
            .iter()
            .rev()
            .map(ResearchSummary::from_record)
            .collect()
    }

    pub async fn report(&self, index: isize) -> String {
        self.workflow.lock().await.export_research_report(index)
    }

    pub async fn data(&self, index: isize) -> Option<String> {
        self.workflow.lock().await.export_research_data(index)
    }

    pub async fn analytics(&self) -> Analytics {
        let workflow = self.workflow.lock().await;
        Analytics::from_records(workflow.history())
    }
}

pub type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunStatus {
    pub run_id: String,
    pub topic: String,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunEvent {
    pub kind: RunEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunEvent {
    pub fn started(topic: &str) -> Self {
        Self {
            kind: RunEventKind::Started,
            message: Some(format!("research started: {topic}")),
            error: None,
        }
    }

    pub fn completed(record: &ResearchRecord) -> Self {
        Self {
            kind: RunEventKind::Completed,
            message: Some(format!("research completed: {}", record.topic())),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            kind: RunEventKind::Failed,
            message: Some("research failed".into()),
            error: Some(error.to_string()),
        }
    }

    fn from_status(status: &RunStatus) -> Self {
        match status.state {
            RunState::Failed => Self::failed(status.error.as_deref().unwrap_or("unknown error")),
            _ => Self {
                kind: RunEventKind::Completed,
                message: Some(format!("research completed: {}", status.topic)),
                error: None,
            },
        }
    }

    pub fn into_sse_event(self) -> Event {
        let data = serde_json::to_string(&self).unwrap_or_else(|_| {
            serde_json::json!({
                "kind": RunEventKind::Failed,
                "message": "failed to serialize run event",
            })
            .to_string()
        });

        Event::default().event(self.kind.as_str()).data(data)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    Started,
    Completed,
    Failed,
}

impl RunEventKind {
    fn as_str(&self) -> &'static str {
        match self {
            RunEventKind::Started => "started",
            RunEventKind::Completed => "completed",
            RunEventKind::Failed => "failed",
        }
    }
}

/// Aggregates over the whole session store, as the dashboard's analytics
/// view presents them.
#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub total_runs: usize,
    pub completed_runs: usize,
    pub failed_runs: usize,
    pub total_duration_seconds: f64,
    pub average_duration_seconds: f64,
    pub total_messages: usize,
    pub agent_totals: BTreeMap<AgentRole, usize>,
    pub recent_topics: Vec<RecentTopic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentTopic {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
}

impl Analytics {
    pub fn from_records(records: &[ResearchRecord]) -> Self {
        let total_runs = records.len();
        let mut completed_runs = 0;
        let mut total_duration_seconds = 0.0;
        let mut total_messages = 0;
        let mut agent_totals: BTreeMap<AgentRole, usize> = BTreeMap::new();

        for record in records {
            if let ResearchRecord::Completed(record) = record {
                completed_runs += 1;
                total_duration_seconds += record.duration_seconds;
                total_messages += record.messages.len();
                for (role, count) in &record.agent_contributions {
                    *agent_totals.entry(*role).or_insert(0) += count;
                }
            }
        }

        let average_duration_seconds = if total_runs > 0 {
            total_duration_seconds / total_runs as f64
        } else {
            0.0
        };

        let recent_topics = records
            .iter()
            .rev()
            .take(5)
            .map(|record| RecentTopic {
                topic: record.topic().to_string(),
                timestamp: record.timestamp(),
            })
            .collect();

        Self {
            total_runs,
            completed_runs,
            failed_runs: total_runs - completed_runs,
            total_duration_seconds,
            average_duration_seconds,
            total_messages,
            agent_totals,
            recent_topics,
        }
    }
}
