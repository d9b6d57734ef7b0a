use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::command::DomainCommand;

/// Caller-supplied work executor
///
/// Invoked once per dispatch. The returned future is the command's
/// execution-completion signal: `Ok(true)` is success, `Ok(false)` or `Err`
/// is a failure handed to the retry handler. A panic inside the future is
/// treated as a failure as well.
///
/// ## Example
///
/// ```rust
/// use async_trait::async_trait;
/// use command_sync::command::DomainCommand;
/// use command_sync::consumer::CommandExecutor;
/// use std::sync::Arc;
///
/// struct LoggingExecutor;
///
/// #[async_trait]
/// impl CommandExecutor for LoggingExecutor {
///     async fn execute(&self, command: Arc<DomainCommand>) -> anyhow::Result<bool> {
///         println!("executing {}", command.command_type);
///         Ok(true)
///     }
/// }
/// ```
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    async fn execute(&self, command: Arc<DomainCommand>) -> anyhow::Result<bool>;
}

/// Closure-backed executor, see [`executor_fn`]
pub struct FnExecutor<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CommandExecutor for FnExecutor<F>
where
    F: Fn(Arc<DomainCommand>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn execute(&self, command: Arc<DomainCommand>) -> anyhow::Result<bool> {
        (self.f)(command).await
    }
}

/// Adapt an async closure into a [`CommandExecutor`]
pub fn executor_fn<F, Fut>(f: F) -> FnExecutor<F>
where
    F: Fn(Arc<DomainCommand>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    FnExecutor { f }
}
