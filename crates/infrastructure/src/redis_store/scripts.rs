//! 服务端脚本
//!
//! 状态转移与扇出的线性化点。每个脚本在 Redis 内原子执行，
//! 失败路径通过带标记的 error reply 返回，客户端据此区分
//! 非法转移与存储故障。

/// `QUEUED → PROCESSING`。返回 1 表示领取成功，0 表示该 id 已过期
/// （状态不再是 queued），调用方应丢弃并继续领取。
pub const CLAIM: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if status ~= 'queued' then
  return 0
end
redis.call('HSET', KEYS[1], 'status', 'processing', 'updated_at', ARGV[1])
return 1
"#;

/// `PROCESSING → SUCCESS` 加消费者扇出。对每个仍为 pending 的下游
/// 递减 pending_count，归零者置 queued 并推入其服务队列。返回
/// [cid, service, ...] 的扁平表。
pub const SUCCEED: &str = r#"
local key = KEYS[1]
local status = redis.call('HGET', key, 'status')
if not status then
  return redis.error_reply('NOTFOUND')
end
if status ~= 'processing' then
  return redis.error_reply('WRONGSTATUS ' .. status)
end
redis.call('HSET', key, 'status', 'success', 'result_ref', ARGV[1], 'updated_at', ARGV[2])
local ready = {}
local raw = redis.call('HGET', key, 'consumers')
if raw then
  for _, cid in ipairs(cjson.decode(raw)) do
    local ckey = 'task:' .. cid
    if redis.call('HGET', ckey, 'status') == 'pending' then
      local left = redis.call('HINCRBY', ckey, 'pending_count', -1)
      if left <= 0 then
        redis.call('HSET', ckey, 'status', 'queued', 'updated_at', ARGV[2])
        local service = redis.call('HGET', ckey, 'service')
        redis.call('LPUSH', 'queue:' .. service, cid)
        table.insert(ready, cid)
        table.insert(ready, service)
      end
    end
  end
end
return ready
"#;

/// `PROCESSING → FAILED`。不触碰下游。
pub const FAIL: &str = r#"
local key = KEYS[1]
local status = redis.call('HGET', key, 'status')
if not status then
  return redis.error_reply('NOTFOUND')
end
if status ~= 'processing' then
  return redis.error_reply('WRONGSTATUS ' .. status)
end
redis.call('HSET', key, 'status', 'failed', 'error', ARGV[1], 'updated_at', ARGV[2])
return 1
"#;

/// 仅当任务仍为 pending 时置 failed，返回 1/0。级联失败模式专用。
pub const FAIL_IF_PENDING: &str = r#"
local key = KEYS[1]
local status = redis.call('HGET', key, 'status')
if status ~= 'pending' then
  return 0
end
redis.call('HSET', key, 'status', 'failed', 'error', ARGV[1], 'updated_at', ARGV[2])
return 1
"#;
