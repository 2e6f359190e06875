//! Status propagation engine and the service that runs it transactionally.

pub mod completion_rollup;
pub mod deletion_closure;
pub mod incompletion_cascade;
pub mod review_chain;
pub mod status_engine;
pub mod task_graph_service;

pub use deletion_closure::DeletionClosure;
pub use status_engine::StatusEngine;
pub use task_graph_service::{
    CreatedTask, DeleteTarget, NewTask, TaskDetails, TaskFilter, TaskGraphService, TaskRelation,
    TaskUpdate,
};
