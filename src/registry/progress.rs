//! Progress updates for interactions with the content store
//!
//! Pulls and pushes report progress as a stream of JSON messages, one per
//! line, written to a caller-supplied sink. The stream owns a writer task;
//! [ProgressStream::close] waits for every queued message to be written.

use crate::errors::ImageError;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};

const PROGRESS_QUEUE_LEN: usize = 64;

/// A single progress or error update
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ProgressMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(
        rename = "progressDetail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(
        rename = "errorDetail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_detail: Option<ErrorDetail>,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ProgressDetail {
    pub current: u64,
    pub total: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
}

impl ProgressMessage {
    pub fn status(id: &str, status: &str) -> Self {
        ProgressMessage {
            id: Some(id.to_owned()),
            status: status.to_owned(),
            ..ProgressMessage::default()
        }
    }

    pub fn progress(id: &str, status: &str, current: u64, total: u64) -> Self {
        ProgressMessage {
            progress_detail: Some(ProgressDetail { current, total }),
            ..ProgressMessage::status(id, status)
        }
    }

    /// The final message sent when an operation fails
    pub fn from_error(err: &ImageError) -> Self {
        let message = err.to_string();
        ProgressMessage {
            error_detail: Some(ErrorDetail {
                code: err.status_code().as_u16(),
                message: message.clone(),
            }),
            error_message: Some(message),
            ..ProgressMessage::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_detail.is_some()
    }
}

/// Cloneable handle for queueing messages onto a [ProgressStream]
#[derive(Clone, Debug)]
pub struct ProgressSender {
    sender: mpsc::Sender<ProgressMessage>,
}

impl ProgressSender {
    /// Queue a message, waiting if the writer is behind
    ///
    /// Messages sent after the stream has closed are dropped.
    pub async fn send(&self, message: ProgressMessage) {
        if self.sender.send(message).await.is_err() {
            log::debug!("progress stream already closed, dropping message");
        }
    }
}

/// An open stream of progress messages headed for one output sink
pub struct ProgressStream {
    sender: ProgressSender,
    writer: JoinHandle<Result<(), ImageError>>,
}

impl ProgressStream {
    /// Start a writer task for the sink
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<W>(out: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(PROGRESS_QUEUE_LEN);
        ProgressStream {
            sender: ProgressSender { sender },
            writer: tokio::spawn(write_messages(out, receiver)),
        }
    }

    /// A handle other tasks can use to report progress
    pub fn sender(&self) -> ProgressSender {
        self.sender.clone()
    }

    pub async fn write(&self, message: ProgressMessage) {
        self.sender.send(message).await
    }

    /// Close the stream and wait until every queued message is written
    ///
    /// The stream only finishes once all [ProgressSender] clones are gone.
    pub async fn close(self) -> Result<(), ImageError> {
        let ProgressStream { sender, writer } = self;
        drop(sender);
        writer.await?
    }
}

async fn write_messages<W>(
    mut out: W,
    mut receiver: mpsc::Receiver<ProgressMessage>,
) -> Result<(), ImageError>
where
    W: AsyncWrite + Unpin,
{
    let mut result = Ok(());
    while let Some(message) = receiver.recv().await {
        // After a write error, keep draining so senders never stall
        if result.is_ok() {
            result = write_message(&mut out, &message).await;
            if let Err(err) = &result {
                log::warn!("failed to write progress message: {}", err);
            }
        }
    }
    result?;
    out.flush().await?;
    out.shutdown().await?;
    Ok(())
}

async fn write_message<W>(out: &mut W, message: &ProgressMessage) -> Result<(), ImageError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}
