//! Ordered request/response stages turning a descriptor into a wire request
//! and a wire response back into decoded values

use crate::request::RequestDescriptor;
use crate::response::Response;
use crate::stages::{AssignContentLength, ComposeUrl, DecodeBody, EncodeBody, NormalizeHeaders};
use crate::Result;
use feign_core::Endpoint;
use std::sync::Arc;
use tracing::{debug, span, Level};

/// Context passed through every stage of one call
#[derive(Clone, Debug)]
pub struct PipelineContext {
    /// App the call is addressed to
    pub app: String,
    /// Endpoint picked for this call
    pub endpoint: Endpoint,
    /// `User-Agent` used when the request sets none
    pub user_agent: String,
    /// Encode a body for GET requests too
    pub allow_get_payload: bool,
}

/// One step of request construction
pub trait RequestStage: Send + Sync {
    /// Stage name for logging
    fn name(&self) -> &'static str {
        "UnnamedRequestStage"
    }

    fn process(&self, context: &PipelineContext, request: &mut RequestDescriptor) -> Result<()>;
}

/// One step of response handling
pub trait ResponseStage: Send + Sync {
    /// Stage name for logging
    fn name(&self) -> &'static str {
        "UnnamedResponseStage"
    }

    fn process(
        &self,
        context: &PipelineContext,
        request: &RequestDescriptor,
        response: &mut Response,
    ) -> Result<()>;
}

/// Ordered request stages; the first failure aborts the remaining ones
#[derive(Clone)]
pub struct RequestPipeline {
    stages: Vec<Arc<dyn RequestStage>>,
}

impl RequestPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage to the end of the pipeline
    pub fn add<S: RequestStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Names of the stages in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order
    pub fn process(&self, context: &PipelineContext, request: &mut RequestDescriptor) -> Result<()> {
        for stage in &self.stages {
            let span = span!(Level::DEBUG, "stage", name = stage.name());
            let _guard = span.enter();
            debug!("Processing request stage");
            stage.process(context, request)?;
        }
        Ok(())
    }
}

impl Default for RequestPipeline {
    /// URL composition, header normalization, body encoding, content length
    fn default() -> Self {
        Self::new()
            .add(ComposeUrl)
            .add(NormalizeHeaders)
            .add(EncodeBody)
            .add(AssignContentLength)
    }
}

/// Ordered response stages; the first failure aborts the remaining ones
#[derive(Clone)]
pub struct ResponsePipeline {
    stages: Vec<Arc<dyn ResponseStage>>,
}

impl ResponsePipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage to the end of the pipeline
    pub fn add<S: ResponseStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order
    pub fn process(
        &self,
        context: &PipelineContext,
        request: &RequestDescriptor,
        response: &mut Response,
    ) -> Result<()> {
        for stage in &self.stages {
            let span = span!(Level::DEBUG, "stage", name = stage.name());
            let _guard = span.enter();
            debug!("Processing response stage");
            stage.process(context, request, response)?;
        }
        Ok(())
    }
}

impl Default for ResponsePipeline {
    fn default() -> Self {
        Self::new().add(DecodeBody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use hyper::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_context() -> PipelineContext {
        PipelineContext {
            app: "ORDERS".to_string(),
            endpoint: Endpoint::parse("http://10.0.0.1:8080").unwrap(),
            user_agent: "feign-test".to_string(),
            allow_get_payload: false,
        }
    }

    struct Recording {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl RequestStage for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process(&self, _context: &PipelineContext, request: &mut RequestDescriptor) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            request.path.push_str(self.name);
            if self.fail {
                return Err(ClientError::InvalidUrl(self.name.to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_default_pipelines() {
        assert_eq!(
            RequestPipeline::default().stage_names(),
            vec!["ComposeUrl", "NormalizeHeaders", "EncodeBody", "AssignContentLength"]
        );
        assert_eq!(ResponsePipeline::default().stage_names(), vec!["DecodeBody"]);
    }

    #[test]
    fn test_stages_run_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = RequestPipeline::new()
            .add(Recording { name: "a", calls: calls.clone(), fail: false })
            .add(Recording { name: "b", calls: calls.clone(), fail: false });

        let mut request = RequestDescriptor::new(Method::GET, "/");
        pipeline.process(&test_context(), &mut request).unwrap();
        assert_eq!(request.path, "/ab");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_aborts_remaining_stages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = RequestPipeline::new()
            .add(Recording { name: "a", calls: calls.clone(), fail: true })
            .add(Recording { name: "b", calls: calls.clone(), fail: false });

        let mut request = RequestDescriptor::new(Method::GET, "/");
        let err = pipeline.process(&test_context(), &mut request).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(ref s) if s == "a"));
        assert_eq!(request.path, "/a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_pipeline_is_noop() {
        let mut request = RequestDescriptor::new(Method::GET, "/x");
        RequestPipeline::new()
            .process(&test_context(), &mut request)
            .unwrap();
        assert!(request.url.is_none());
    }
}
