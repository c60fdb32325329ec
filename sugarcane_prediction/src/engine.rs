use crate::{error::InferenceError, postprocess::ScoreVector, preprocess::InputTensor};

/// A model execution backend.
///
/// `infer` takes `&mut self`, so a single instance serves one call at a time.
/// After `close` every further `infer` must fail with
/// [`InferenceError::Closed`]; calling `close` again is a no-op.
pub trait InferenceEngine: Send {
    fn name(&self) -> &'static str;
    fn infer(&mut self, tensor: &InputTensor) -> Result<ScoreVector, InferenceError>;
    fn close(&mut self);
    fn is_closed(&self) -> bool;
}

/// Owns an engine and closes it when dropped, whichever way the owner exits.
pub struct EngineGuard<E: InferenceEngine> {
    engine: E,
}

impl<E: InferenceEngine> EngineGuard<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn infer(&mut self, tensor: &InputTensor) -> Result<ScoreVector, InferenceError> {
        self.engine.infer(tensor)
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.engine.is_closed() {
            tracing::debug!("Closing {} inference engine", self.engine.name());
            self.engine.close();
        }
    }
}

impl<E: InferenceEngine> Drop for EngineGuard<E> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Backend returning fixed scores, optionally failing every call.
    pub struct StubEngine {
        scores: Vec<f32>,
        failing: bool,
        closed: bool,
        closes: Arc<AtomicUsize>,
        pub last_input: Option<Vec<f32>>,
    }

    impl StubEngine {
        pub fn returning(scores: &[f32]) -> Self {
            Self {
                scores: scores.to_vec(),
                failing: false,
                closed: false,
                closes: Arc::new(AtomicUsize::new(0)),
                last_input: None,
            }
        }

        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::returning(&[])
            }
        }

        pub fn close_counter(&self) -> Arc<AtomicUsize> {
            self.closes.clone()
        }
    }

    impl InferenceEngine for StubEngine {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn infer(&mut self, tensor: &InputTensor) -> Result<ScoreVector, InferenceError> {
            if self.closed {
                return Err(InferenceError::Closed);
            }
            if self.failing {
                return Err(InferenceError::Backend("injected failure".to_string()));
            }
            self.last_input = Some(tensor.to_vec());
            Ok(ScoreVector::from(self.scores.clone()))
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubEngine;
    use super::*;
    use crate::preprocess::{Preprocessor, RawImage};
    use std::sync::atomic::Ordering;

    fn tensor() -> InputTensor {
        let image = RawImage::from_raw(4, 4, vec![0; 48]).unwrap();
        Preprocessor::default().preprocess(&image)
    }

    #[test]
    fn test_infer_after_close_fails() {
        let mut engine = StubEngine::returning(&[0.1, 0.9, 0.0]);
        assert!(engine.infer(&tensor()).is_ok());

        engine.close();

        assert!(matches!(engine.infer(&tensor()), Err(InferenceError::Closed)));
    }

    #[test]
    fn test_infer_after_failure_and_close_fails() {
        let mut engine = StubEngine::failing();
        assert!(matches!(
            engine.infer(&tensor()),
            Err(InferenceError::Backend(_))
        ));

        engine.close();

        assert!(matches!(engine.infer(&tensor()), Err(InferenceError::Closed)));
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let engine = StubEngine::returning(&[0.1, 0.9, 0.0]);
        let closes = engine.close_counter();

        {
            let mut guard = EngineGuard::new(engine);
            assert!(guard.infer(&tensor()).is_ok());
        }

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_closes_once() {
        let engine = StubEngine::failing();
        let closes = engine.close_counter();

        let mut guard = EngineGuard::new(engine);
        assert!(guard.infer(&tensor()).is_err());
        guard.close();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
