use crate::error::{GatewayError, Result};
use crossbeam::queue::ArrayQueue;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::cell::UnsafeCell;
use std::path::Path;

/// A pool of ONNX Runtime Sessions for parallel inference.
///
/// `Session::run` requires `&mut self`. Rather than serializing every request
/// behind a Mutex, the pool holds N independent sessions and hands out
/// exclusive indices through a lock-free queue.
///
/// # Safety
/// Each session index is held by at most one thread between `pop` and `push`
/// on the ArrayQueue, so the `UnsafeCell` behind that index is never aliased.
pub struct SessionPool {
    sessions: Vec<UnsafeCell<Session>>,
    available: ArrayQueue<usize>,
}

impl SessionPool {
    /// Load `pool_size` sessions from the same model file with Level3 optimization.
    pub fn load(model_path: &Path, pool_size: usize, intra_threads: usize) -> Result<Self> {
        let pool_size = pool_size.max(1);

        // Read model file once
        let model_bytes = std::fs::read(model_path)
            .map_err(|e| GatewayError::Model(format!("Failed to read model file: {}", e)))?;

        let mut sessions = Vec::with_capacity(pool_size);
        let available = ArrayQueue::new(pool_size);

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| GatewayError::Model(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| GatewayError::Model(e.to_string()))?
                .with_intra_threads(intra_threads)
                .map_err(|e| GatewayError::Model(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e: ort::Error| GatewayError::Model(e.to_string()))?;

            sessions.push(UnsafeCell::new(session));
            available
                .push(i)
                .map_err(|_| GatewayError::Model("Failed to initialize session pool".into()))?;
        }

        tracing::info!(
            path = %model_path.display(),
            pool_size,
            intra_threads,
            "ONNX session pool loaded successfully"
        );

        Ok(Self {
            sessions,
            available,
        })
    }

    /// Run `f` with exclusive access to one pooled session.
    ///
    /// Fails with a model error when every session is busy; callers bound
    /// concurrency upstream so this only happens under misconfiguration.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let index = self
            .available
            .pop()
            .ok_or_else(|| GatewayError::Model("No available sessions in pool".into()))?;

        // SAFETY: the index was popped from the queue, so no other thread holds it
        // until it is pushed back below.
        let session = unsafe { &mut *self.sessions[index].get() };
        let result = f(session);

        // Only indices we popped are pushed back, so the queue cannot be full.
        let _ = self.available.push(index);
        result
    }

    pub fn size(&self) -> usize {
        self.sessions.len()
    }
}

// SAFETY: sessions are only reached through `with_session`, which grants
// exclusive access per index via the lock-free queue (same guarantee as a Mutex
// per session, without blocking).
unsafe impl Send for SessionPool {}
unsafe impl Sync for SessionPool {}
