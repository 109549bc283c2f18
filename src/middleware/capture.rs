use axum::body::Body;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

/// Holds the first data frame a response body produced.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    first: Option<Bytes>,
}

impl ResponseCapture {
    /// Records `data` unless a value was already captured. Returns whether it was stored.
    pub fn record(&mut self, data: &Bytes) -> bool {
        if self.first.is_some() {
            return false;
        }
        self.first = Some(data.clone());
        true
    }

    pub fn get(&self) -> Option<&Bytes> {
        self.first.as_ref()
    }

    pub fn into_inner(self) -> Option<Bytes> {
        self.first
    }
}

type CompletionHook = Box<dyn FnOnce(Option<Bytes>) + Send + 'static>;

/// Response body wrapper that forwards every frame unchanged and captures
/// the first data frame on the way through.
///
/// The completion hook runs exactly once: when the inner body reaches the
/// end of its stream, or when the wrapper is dropped before that (client
/// went away, body error, body never polled).
pub struct CapturedBody {
    inner: Body,
    capture: ResponseCapture,
    on_complete: Option<CompletionHook>,
}

impl CapturedBody {
    pub fn new<F>(inner: Body, on_complete: F) -> Self
    where
        F: FnOnce(Option<Bytes>) + Send + 'static,
    {
        Self {
            inner,
            capture: ResponseCapture::default(),
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn complete(&mut self) {
        if let Some(hook) = self.on_complete.take() {
            hook(std::mem::take(&mut self.capture).into_inner());
        }
    }
}

impl HttpBody for CapturedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.record(data);
                }
            }
            Poll::Ready(None) => this.complete(),
            Poll::Ready(Some(Err(_))) | Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CapturedBody {
    fn drop(&mut self) {
        self.complete();
    }
}

impl fmt::Debug for CapturedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedBody")
            .field("capture", &self.capture)
            .field("completed", &self.on_complete.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};

    type Completions = Arc<Mutex<Vec<Option<Bytes>>>>;

    fn tracked(inner: Body) -> (CapturedBody, Completions) {
        let completions: Completions = Arc::default();
        let sink = completions.clone();
        let body = CapturedBody::new(inner, move |captured| {
            sink.lock().unwrap().push(captured);
        });
        (body, completions)
    }

    fn chunked(chunks: Vec<&'static str>) -> Body {
        Body::from_stream(futures::stream::iter(
            chunks.into_iter().map(Ok::<_, std::io::Error>),
        ))
    }

    #[test]
    fn capture_keeps_only_the_first_value() {
        let mut capture = ResponseCapture::default();
        assert!(capture.record(&Bytes::from_static(b"first")));
        assert!(!capture.record(&Bytes::from_static(b"second")));
        assert_eq!(capture.get().unwrap(), &Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn forwards_every_frame_and_captures_the_first() {
        let (body, completions) = tracked(chunked(vec![r#"{"a":1}"#, r#"{"a":2}"#]));

        let delivered = body.collect().await.unwrap().to_bytes();

        assert_eq!(delivered, Bytes::from_static(br#"{"a":1}{"a":2}"#));
        let completions = completions.lock().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0], Some(Bytes::from_static(br#"{"a":1}"#)));
    }

    #[tokio::test]
    async fn single_buffer_body_is_captured_whole() {
        let (body, completions) = tracked(Body::from("hello world"));

        let delivered = body.collect().await.unwrap().to_bytes();

        assert_eq!(delivered, Bytes::from_static(b"hello world"));
        assert_eq!(
            completions.lock().unwrap().as_slice(),
            &[Some(Bytes::from_static(b"hello world"))]
        );
    }

    #[tokio::test]
    async fn empty_body_completes_with_nothing_captured() {
        let (body, completions) = tracked(Body::empty());

        let delivered = body.collect().await.unwrap().to_bytes();

        assert!(delivered.is_empty());
        assert_eq!(completions.lock().unwrap().as_slice(), &[None]);
    }

    #[test]
    fn dropping_an_unpolled_body_still_completes_once() {
        let (body, completions) = tracked(Body::from("never sent"));
        drop(body);
        assert_eq!(completions.lock().unwrap().as_slice(), &[None]);
    }

    #[tokio::test]
    async fn body_errors_propagate_unchanged() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "upstream reset")),
        ]);
        let (body, completions) = tracked(Body::from_stream(stream));

        let err = body.collect().await.unwrap_err();

        assert!(err.to_string().contains("upstream reset"));
        assert_eq!(
            completions.lock().unwrap().as_slice(),
            &[Some(Bytes::from_static(b"partial"))]
        );
    }

    #[test]
    fn size_hint_is_forwarded() {
        let (body, _completions) = tracked(Body::from("12345"));
        assert_eq!(body.size_hint().exact(), Some(5));
        assert!(!body.is_end_stream());
    }
}
