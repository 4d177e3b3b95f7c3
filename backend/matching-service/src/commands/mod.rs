// ============================================
// Command Driver (指令驅動)
// ============================================
//
// Newline-delimited JSON in, one JSON response per line out:
//
//   {"op":"add_attributes","member":"1","attributes":["gender:f"]}
//   {"op":"record_interest","actor":"5","delta":1.0,"attributes":["gender:f"]}
//   {"op":"recommend","args":["10","1","gender:f","0","0","0"]}
//   {"op":"recommend_for","member":"5","cardinality":10,"or_filters":["gender:f"]}
//
// A bad line gets an error response and the driver moves on to the next.

use crate::error::{MatchError, Result};
use crate::models::{Match, MatchQuery};
use crate::services::MatchingService;
use crate::store::PostingStore;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    AddAttributes {
        member: String,
        attributes: Vec<String>,
    },
    RecordInterest {
        actor: String,
        delta: f64,
        attributes: Vec<String>,
    },
    /// Flat argument list, see [`MatchQuery::from_args`]
    Recommend { args: Vec<String> },
    RecommendFor {
        member: String,
        cardinality: usize,
        #[serde(default)]
        or_filters: Vec<String>,
        #[serde(default)]
        and_filters: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchEntry {
    pub member: String,
    pub score: f64,
}

impl From<Match> for MatchEntry {
    fn from(m: Match) -> Self {
        Self {
            member: m.member_id,
            score: m.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<MatchEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn done() -> Self {
        Self {
            ok: true,
            matches: None,
            error: None,
            message: None,
        }
    }

    pub fn matches(matches: Vec<Match>) -> Self {
        Self {
            matches: Some(matches.into_iter().map(MatchEntry::from).collect()),
            ..Self::done()
        }
    }

    pub fn failure(err: &MatchError) -> Self {
        Self {
            ok: false,
            matches: None,
            error: Some(err.code().to_string()),
            message: Some(err.to_string()),
        }
    }
}

pub async fn execute<S: PostingStore>(service: &MatchingService<S>, command: Command) -> Response {
    let outcome = match command {
        Command::AddAttributes { member, attributes } => service
            .add_attributes(&member, &attributes)
            .await
            .map(|_| None),
        Command::RecordInterest {
            actor,
            delta,
            attributes,
        } => service
            .record_interest(&actor, delta, &attributes)
            .await
            .map(|_| None),
        Command::Recommend { args } => recommend_args(service, &args).await.map(Some),
        Command::RecommendFor {
            member,
            cardinality,
            or_filters,
            and_filters,
        } => service
            .recommend_for(&member, cardinality, &or_filters, &and_filters)
            .await
            .map(Some),
    };

    match outcome {
        Ok(Some(matches)) => Response::matches(matches),
        Ok(None) => Response::done(),
        Err(err) => {
            debug!(code = err.code(), error = %err, "Command failed");
            Response::failure(&err)
        }
    }
}

async fn recommend_args<S: PostingStore>(
    service: &MatchingService<S>,
    args: &[String],
) -> Result<Vec<Match>> {
    let query = MatchQuery::from_args(args)?;
    service.recommend(&query).await
}

/// Serve commands from `reader` until EOF. Returns the number of commands
/// answered. Only I/O on the two streams ends the loop early.
pub async fn run_lines<S, R, W>(
    service: &MatchingService<S>,
    reader: R,
    mut writer: W,
) -> std::io::Result<usize>
where
    S: PostingStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(line) {
            Ok(command) => execute(service, command).await,
            Err(err) => Response::failure(&MatchError::InvalidArgument(format!(
                "malformed command: {}",
                err
            ))),
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        answered += 1;
    }

    info!(answered = answered, "Command stream closed");
    Ok(answered)
}
