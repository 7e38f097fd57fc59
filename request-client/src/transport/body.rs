//! Request body handed to transports.

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// A fully buffered request body.
///
/// Payloads are encoded before dispatch, so a body is either absent or a
/// single chunk that is yielded as one data frame.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum TransportBody {
    #[default]
    Empty,
    Full(Bytes),
}

impl TransportBody {
    /// A body without content.
    pub fn empty() -> Self {
        TransportBody::Empty
    }

    /// A body holding `data`. Empty data yields an empty body.
    pub fn full(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            TransportBody::Empty
        } else {
            TransportBody::Full(data)
        }
    }

    /// The buffered content, if any is left.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            TransportBody::Empty => None,
            TransportBody::Full(data) => Some(data),
        }
    }

    /// Number of bytes left to send.
    pub fn len(&self) -> usize {
        self.as_bytes().map_or(0, Bytes::len)
    }

    /// Whether nothing is left to send.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Body for TransportBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let frame = match std::mem::take(self.get_mut()) {
            TransportBody::Empty => None,
            TransportBody::Full(data) => Some(Ok(Frame::data(data))),
        };
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        matches!(self, TransportBody::Empty)
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.len() as u64)
    }
}

impl From<Bytes> for TransportBody {
    fn from(data: Bytes) -> Self {
        TransportBody::full(data)
    }
}

impl From<String> for TransportBody {
    fn from(data: String) -> Self {
        TransportBody::full(data)
    }
}

impl From<Vec<u8>> for TransportBody {
    fn from(data: Vec<u8>) -> Self {
        TransportBody::full(data)
    }
}

impl From<&'static str> for TransportBody {
    fn from(data: &'static str) -> Self {
        TransportBody::full(data)
    }
}

impl fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // length only, bodies may carry credentials
        match self {
            TransportBody::Empty => f.write_str("TransportBody::Empty"),
            TransportBody::Full(data) => write!(f, "TransportBody::Full({} bytes)", data.len()),
        }
    }
}
