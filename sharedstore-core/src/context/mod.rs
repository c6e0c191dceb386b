/*
    Context subsystem - one event loop per execution context

    The owner and every worker each hold exactly one SharedStorage context.
    Application code only ever touches the cloneable handle.
*/

pub mod error;
mod event_loop;
pub mod handle;
pub mod worker;

pub use error::{StorageError, StorageResult};
pub use handle::{ExecutionContext, SharedStorage};
pub use worker::{WorkerHandle, WorkerScope};
