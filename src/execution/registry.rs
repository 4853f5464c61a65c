//! # Executor Registry
//!
//! One [`ResilientExecutor`] per pipeline stage, created on demand and cached. All
//! executors share a single [`DepthGuard`], so degraded mode entered by any stage
//! applies to the whole pipeline session.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ResilienceConfig;
use crate::error::Result;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
use crate::queue::WorkQueue;

use super::depth_guard::DepthGuard;
use super::executor::ResilientExecutor;
use super::fallback::FallbackResultProvider;
use super::health::ExecutorHealth;
use super::retry::RetryConfig;
use super::stats::ExecutionStats;

/// Pipeline stages that get their own executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ContentPlanning,
    ContentCreation,
    JsxGeneration,
    TemplateAnalysis,
    LayoutAnalysis,
    ImageAnalysis,
    VectorSearch,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::ContentPlanning,
        PipelineStage::ContentCreation,
        PipelineStage::JsxGeneration,
        PipelineStage::TemplateAnalysis,
        PipelineStage::LayoutAnalysis,
        PipelineStage::ImageAnalysis,
        PipelineStage::VectorSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ContentPlanning => "content_planning",
            PipelineStage::ContentCreation => "content_creation",
            PipelineStage::JsxGeneration => "jsx_generation",
            PipelineStage::TemplateAnalysis => "template_analysis",
            PipelineStage::LayoutAnalysis => "layout_analysis",
            PipelineStage::ImageAnalysis => "image_analysis",
            PipelineStage::VectorSearch => "vector_search",
        }
    }

    /// Breaker preset for the external service this stage depends on, used when
    /// the configuration has no `[circuit_breaker]` section
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        match self {
            PipelineStage::VectorSearch => CircuitBreakerConfig::for_vector_search(),
            PipelineStage::ImageAnalysis => CircuitBreakerConfig::for_rendering(),
            _ => CircuitBreakerConfig::for_llm(),
        }
    }

    /// Retry preset; generation stages get more time than lookups
    pub fn retry_config(&self) -> RetryConfig {
        match self {
            PipelineStage::ContentPlanning | PipelineStage::ContentCreation => {
                RetryConfig::new(2, Duration::from_secs(60), 2.0)
            }
            PipelineStage::JsxGeneration => {
                RetryConfig::new(2, Duration::from_secs(45), 2.0).with_priority(1)
            }
            PipelineStage::TemplateAnalysis | PipelineStage::LayoutAnalysis => {
                RetryConfig::new(1, Duration::from_secs(30), 1.5).with_priority(2)
            }
            PipelineStage::ImageAnalysis => RetryConfig::new(1, Duration::from_secs(30), 2.0),
            PipelineStage::VectorSearch => {
                RetryConfig::new(2, Duration::from_secs(10), 1.5).with_priority(-1)
            }
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage executors sharing one depth guard and one fallback provider
pub struct ExecutorRegistry<T: Send + 'static> {
    config: ResilienceConfig,
    depth_guard: Arc<DepthGuard>,
    fallback: Arc<dyn FallbackResultProvider<T>>,
    executors: DashMap<PipelineStage, Arc<ResilientExecutor<T>>>,
}

impl<T: Send + 'static> ExecutorRegistry<T> {
    /// Create a registry for one pipeline session
    pub fn new(
        config: ResilienceConfig,
        fallback: Arc<dyn FallbackResultProvider<T>>,
    ) -> Result<Self> {
        config.validate()?;
        let depth_guard = Arc::new(DepthGuard::new(config.depth_guard.clone()));
        info!(
            stack_limit = config.depth_guard.stack_limit,
            safety_buffer = config.depth_guard.safety_buffer,
            "Initializing executor registry"
        );

        Ok(Self {
            config,
            depth_guard,
            fallback,
            executors: DashMap::new(),
        })
    }

    /// Get or create the executor for a stage
    pub fn get_or_create(&self, stage: PipelineStage) -> Arc<ResilientExecutor<T>> {
        if let Some(executor) = self.executors.get(&stage) {
            return Arc::clone(executor.value());
        }

        let entry = self.executors.entry(stage).or_insert_with(|| {
            let name = stage.as_str();
            let breaker_config = self
                .config
                .circuit_breaker
                .clone()
                .unwrap_or_else(|| stage.circuit_breaker_config());
            let executor = ResilientExecutor::with_components(
                name,
                Arc::new(CircuitBreaker::new(name, breaker_config)),
                Arc::new(WorkQueue::new(name, self.config.work_queue.clone())),
                Arc::clone(&self.depth_guard),
                Arc::clone(&self.fallback),
                self.config.backoff.clone(),
            );
            Arc::new(executor)
        });

        let executor = Arc::clone(entry.value());
        drop(entry);
        info!(
            stage = %stage,
            total_executors = self.executors.len(),
            "Created resilient executor for stage"
        );
        executor
    }

    pub fn get(&self, stage: PipelineStage) -> Option<Arc<ResilientExecutor<T>>> {
        self.executors
            .get(&stage)
            .map(|executor| Arc::clone(executor.value()))
    }

    pub fn list_stages(&self) -> Vec<PipelineStage> {
        self.executors.iter().map(|entry| *entry.key()).collect()
    }

    /// Stats for each created executor, keyed by stage name
    pub fn stats_by_stage(&self) -> HashMap<String, ExecutionStats> {
        self.executors
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().stats()))
            .collect()
    }

    /// Counters summed across every stage
    pub fn total_stats(&self) -> ExecutionStats {
        self.executors
            .iter()
            .fold(ExecutionStats::default(), |total, entry| {
                total.merge(&entry.value().stats())
            })
    }

    pub fn health_by_stage(&self) -> HashMap<String, ExecutorHealth> {
        self.executors
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().health()))
            .collect()
    }

    /// Reset every executor. The shared degraded-mode latch is left as is.
    pub fn reset_all(&self) {
        if self.depth_guard.is_degraded() {
            warn!("Resetting executors while degraded mode is latched");
        }
        for entry in self.executors.iter() {
            entry.value().reset_state();
        }
        info!(total_executors = self.executors.len(), "All executors reset");
    }

    /// Stop every executor's worker pool
    pub async fn shutdown(&self) {
        let executors: Vec<_> = self
            .executors
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for executor in executors {
            executor.shutdown().await;
        }
    }

    pub fn depth_guard(&self) -> &Arc<DepthGuard> {
        &self.depth_guard
    }

    pub fn is_degraded(&self) -> bool {
        self.depth_guard.is_degraded()
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }
}

impl<T: Send + 'static> fmt::Debug for ExecutorRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("stages", &self.list_stages())
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}
