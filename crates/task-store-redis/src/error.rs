use perfbench_task_store::TaskStoreError;

#[allow(clippy::needless_pass_by_value)] // passed by value to .map_err()
pub(crate) fn map_redis_err(e: redis::RedisError) -> TaskStoreError {
    use redis::ErrorKind;
    match e.kind() {
        ErrorKind::IoError | ErrorKind::AuthenticationFailed => {
            TaskStoreError::Connection(e.to_string())
        }
        _ => TaskStoreError::Other(e.to_string()),
    }
}
