use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use perfbench_domain::keys;
use perfbench_domain::{NewTask, OwnerId, Task, TaskId, TaskState, Transition};
use perfbench_task_store::{TaskFilter, TaskPage, TaskStore, TaskStoreError, newest_first};

use crate::codec;
use crate::error::map_redis_err;

/// Write lifecycle fields only if the state field still holds the expected value.
/// ARGV: expected state, then field/value pairs.
const CAS_STATE_SCRIPT: &str = r#"
local cur = redis.call('HGET', KEYS[1], 'state')
if not cur then
    return -1
end
if cur ~= ARGV[1] then
    return 0
end
for i = 2, #ARGV, 2 do
    redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
end
return 1
"#;

const DELETE_OWNED_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], 'owner_id') == ARGV[1] then
    redis.call('DEL', KEYS[1])
    redis.call('ZREM', KEYS[2], ARGV[2])
    return 1
else
    return 0
end
"#;

/// Attempts before giving up on a transition that keeps racing another writer.
const MAX_CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct RedisTaskStoreConfig {
    pub url: String,
}

impl Default for RedisTaskStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

pub struct RedisTaskStore {
    conn: redis::aio::ConnectionManager,
    closed: AtomicBool,
}

impl RedisTaskStore {
    pub async fn connect(config: RedisTaskStoreConfig) -> Result<Self, TaskStoreError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| TaskStoreError::Connection(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| TaskStoreError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            closed: AtomicBool::new(false),
        })
    }

    fn check_closed(&self) -> Result<(), TaskStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TaskStoreError::Other("store is closed".to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
        let mut conn = self.conn.clone();
        let hash: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(keys::task_key(id.get()))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        if hash.is_empty() {
            return Ok(None);
        }
        codec::decode(id, hash).map(Some)
    }

    /// Returns -1 when the task vanished, 0 when the state moved, 1 on write.
    async fn cas_lifecycle(&self, expected: TaskState, next: &Task) -> Result<i32, TaskStoreError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(CAS_STATE_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(keys::task_key(next.id.get()))
            .arg(expected.as_str());
        for (field, value) in codec::lifecycle_fields(next) {
            invocation.arg(field).arg(value);
        }
        invocation
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_err)
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn insert(&self, task: NewTask) -> Result<Task, TaskStoreError> {
        self.check_closed()?;
        let mut conn = self.conn.clone();
        let raw_id: u64 = redis::cmd("INCR")
            .arg(keys::TASK_SEQUENCE_KEY)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        let task = Task::from_new(TaskId::new(raw_id), task);
        let pairs = codec::encode(&task)?;

        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(keys::task_key(raw_id))
            .arg(&pairs)
            .ignore()
            .cmd("ZADD")
            .arg(keys::owner_index_key(task.owner_id.get()))
            .arg(task.created_at)
            .arg(raw_id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_err)?;

        tracing::debug!(task_id = %task.id, "task inserted");
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
        self.check_closed()?;
        self.fetch(id).await
    }

    async fn update_state(
        &self,
        id: TaskId,
        transition: Transition,
    ) -> Result<Task, TaskStoreError> {
        self.check_closed()?;
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some(current) = self.fetch(id).await? else {
                return Err(TaskStoreError::NotFound(id));
            };
            let mut next = current.clone();
            next.apply(transition.clone())?;

            match self.cas_lifecycle(current.state, &next).await? {
                1 => return Ok(next),
                -1 => return Err(TaskStoreError::NotFound(id)),
                _ => {
                    tracing::debug!(task_id = %id, attempt, "state moved during update, retrying");
                }
            }
        }
        Err(TaskStoreError::Other(format!(
            "task {id}: state kept changing during update"
        )))
    }

    async fn list(&self, filter: &TaskFilter) -> Result<TaskPage, TaskStoreError> {
        self.check_closed()?;
        let mut conn = self.conn.clone();
        let ids: Vec<u64> = redis::cmd("ZREVRANGE")
            .arg(keys::owner_index_key(filter.owner.get()))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;

        let mut matches = Vec::new();
        for raw_id in ids {
            // Index entries can outlive a record removed out of band.
            let Some(task) = self.fetch(TaskId::new(raw_id)).await? else {
                continue;
            };
            if filter.matches(&task) {
                matches.push(task);
            }
        }
        matches.sort_by(newest_first);
        Ok(filter.paginate(matches))
    }

    async fn delete(&self, id: TaskId, owner: OwnerId) -> Result<bool, TaskStoreError> {
        self.check_closed()?;
        let mut conn = self.conn.clone();
        let removed: i32 = redis::Script::new(DELETE_OWNED_SCRIPT)
            .key(keys::task_key(id.get()))
            .key(keys::owner_index_key(owner.get()))
            .arg(owner.to_string())
            .arg(id.get())
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(removed == 1)
    }

    async fn ping(&self) -> Result<bool, TaskStoreError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(pong == "PONG")
    }

    async fn close(&self) -> Result<(), TaskStoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
