use super::{InterestUpdate, PostingStore, WriteBatch};
use crate::error::Result;
use crate::posting::{Aggregate, PostingList, WeightedKey};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info};

// KEYS[1] raw list, KEYS[2] normalized list
// ARGV[1] actor, ARGV[2] delta, ARGV[3] interested key head,
// ARGV[4] interested key tail, ARGV[5..] attributes
//
// The interested keys are derived inside the script, so this needs a
// non-clustered Redis.
const ACCUMULATE_INTEREST: &str = r#"
local raw, normalized = KEYS[1], KEYS[2]
local actor, delta, head, tail = ARGV[1], ARGV[2], ARGV[3], ARGV[4]

for i = 5, #ARGV do
    redis.call('ZINCRBY', raw, delta, ARGV[i])
end

local entries = redis.call('ZRANGE', raw, 0, -1, 'WITHSCORES')
local weights = {}
for i = 2, #entries, 2 do
    weights[#weights + 1] = tonumber(entries[i])
end
table.sort(weights, function(a, b) return math.abs(a) < math.abs(b) end)
local total = 0
for _, w in ipairs(weights) do
    total = total + w
end

if total ~= 0 then
    for i = 1, #entries, 2 do
        local weight = tonumber(entries[i + 1])
        if weight ~= 0 then
            local share = string.format('%.17g', weight / total)
            redis.call('ZADD', normalized, share, entries[i])
            redis.call('ZADD', head .. entries[i] .. tail, share, actor)
        end
    end
end

return entries
"#;

/// Sorted-set posting store on Redis.
///
/// Batches run as `MULTI`/`EXEC` pipelines; set algebra is delegated to
/// `ZUNIONSTORE`/`ZINTERSTORE` with `WEIGHTS` and `AGGREGATE` always spelled out.
/// Interest accumulation is one Lua script, atomic across every client of
/// the server.
#[derive(Clone)]
pub struct RedisPostingStore {
    conn: ConnectionManager,
    accumulate: Script,
}

impl RedisPostingStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            accumulate: Script::new(ACCUMULATE_INTEREST),
        }
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Redis posting store connected");
        Ok(Self::new(conn))
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn combine_store(
        &self,
        command: &str,
        dest: &str,
        sources: &[WeightedKey],
        aggregate: Aggregate,
    ) -> Result<usize> {
        let mut conn = self.conn.clone();

        // numkeys = 0 is a Redis error; an empty combination is an empty list
        if sources.is_empty() {
            let _: () = conn.del(dest).await?;
            return Ok(0);
        }

        let mut cmd = redis::cmd(command);
        cmd.arg(dest).arg(sources.len());
        for source in sources {
            cmd.arg(&source.key);
        }
        cmd.arg("WEIGHTS");
        for source in sources {
            cmd.arg(source.weight);
        }
        cmd.arg("AGGREGATE").arg(aggregate.as_str());

        let size: usize = cmd.query_async(&mut conn).await?;

        debug!(
            command = command,
            dest = dest,
            sources = sources.len(),
            size = size,
            "Posting lists combined"
        );

        Ok(size)
    }
}

#[async_trait]
impl PostingStore for RedisPostingStore {
    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn.zscore(key, member).await?;
        Ok(score)
    }

    async fn entries(&self, key: &str) -> Result<PostingList> {
        let mut conn = self.conn.clone();
        let entries: Vec<(String, f64)> = conn.zrange_withscores(key, 0, -1).await?;
        Ok(entries.into_iter().collect())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.ops() {
            pipe.zadd(&op.key, &op.member, op.score).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;

        debug!(ops = batch.ops().len(), "Batch applied");
        Ok(())
    }

    async fn accumulate_interest(&self, update: &InterestUpdate) -> Result<PostingList> {
        let mut conn = self.conn.clone();
        let mut invocation = self.accumulate.prepare_invoke();
        invocation
            .key(&update.raw_key)
            .key(&update.normalized_key)
            .arg(&update.actor)
            .arg(update.delta)
            .arg(&update.interested_head)
            .arg(&update.interested_tail)
            .arg(&update.attributes);

        let raw: Vec<(String, f64)> = invocation.invoke_async(&mut conn).await?;

        debug!(
            actor = %update.actor,
            attributes = update.attributes.len(),
            tracked = raw.len(),
            "Interest accumulated"
        );

        Ok(raw.into_iter().collect())
    }

    async fn union_store(
        &self,
        dest: &str,
        sources: &[WeightedKey],
        aggregate: Aggregate,
    ) -> Result<usize> {
        self.combine_store("ZUNIONSTORE", dest, sources, aggregate)
            .await
    }

    async fn inter_store(
        &self,
        dest: &str,
        sources: &[WeightedKey],
        aggregate: Aggregate,
    ) -> Result<usize> {
        self.combine_store("ZINTERSTORE", dest, sources, aggregate)
            .await
    }

    async fn range_desc(&self, key: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // stop = -1 reads to the end when limit does not fit an isize
        let stop = isize::try_from(limit - 1).unwrap_or(-1);
        let mut conn = self.conn.clone();
        let entries: Vec<(String, f64)> = conn.zrevrange_withscores(key, 0, stop).await?;
        Ok(entries)
    }

    async fn expire(&self, keys: &[String], ttl_secs: u64) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.expire(key, ttl).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}
