use bytes::Bytes;
use smallvec::SmallVec;

/// Key positions inside an argv: index of the first key, index of the
/// last key (negative counts from the end), and the step between keys.
/// Indices are over the full argv, the command name sitting at 0.
struct KeySpec {
    first: usize,
    last: i32,
    step: usize,
}

const fn spec(first: usize, last: i32, step: usize) -> Option<KeySpec> {
    Some(KeySpec { first, last, step })
}

/// The static routing table. Commands a replication stream produces are
/// covered; anything unknown reports no keys and routes to the default
/// lane.
fn key_spec(name: &str) -> Option<KeySpec> {
    match name {
        "APPEND" | "DECR" | "DECRBY" | "DUMP" | "EXPIRE" | "EXPIREAT" | "GETDEL" | "GETEX"
        | "GETSET" | "GETRANGE" | "GETBIT" | "GET" | "HDEL" | "HGET" | "HGETALL" | "HINCRBY"
        | "HINCRBYFLOAT" | "HMGET" | "HMSET" | "HSET" | "HSETNX" | "INCR" | "INCRBY"
        | "INCRBYFLOAT" | "LINSERT" | "LPOP" | "LPUSH" | "LPUSHX" | "LREM" | "LSET" | "LTRIM"
        | "PERSIST" | "PEXPIRE" | "PEXPIREAT" | "PFADD" | "PSETEX" | "RESTORE" | "RPOP"
        | "RPUSH" | "RPUSHX" | "SADD" | "SET" | "SETBIT" | "SETEX" | "SETNX" | "SETRANGE"
        | "SPOP" | "SREM" | "XADD" | "XDEL" | "XSETID" | "XTRIM" | "ZADD" | "ZINCRBY"
        | "ZPOPMAX" | "ZPOPMIN" | "ZREM" | "ZREMRANGEBYLEX" | "ZREMRANGEBYRANK"
        | "ZREMRANGEBYSCORE" | "GEOADD" => spec(1, 1, 1),
        "DEL" | "EXISTS" | "MGET" | "PFCOUNT" | "PFMERGE" | "SDIFFSTORE" | "SINTERSTORE"
        | "SUNIONSTORE" | "TOUCH" | "UNLINK" | "WATCH" => spec(1, -1, 1),
        "MSET" | "MSETNX" => spec(1, -1, 2),
        "COPY" | "LMOVE" | "RENAME" | "RENAMENX" | "RPOPLPUSH" | "SMOVE" | "ZRANGESTORE"
        | "GEOSEARCHSTORE" => spec(1, 2, 1),
        "BITOP" => spec(2, -1, 1),
        _ => None,
    }
}

/// Keys touched by an arbitrary command argv, `argv[0]` being the command
/// name. `EVAL`/`EVALSHA` carry their own key count and are handled apart
/// from the table.
pub fn extract_keys(argv: &[Bytes]) -> SmallVec<[Bytes; 4]> {
    let mut keys = SmallVec::new();

    let Some(name) = argv.first() else {
        return keys;
    };
    let name = String::from_utf8_lossy(name).to_ascii_uppercase();

    if name == "EVAL" || name == "EVALSHA" {
        if let Some(numkeys) = argv.get(2)
            && let Ok(numkeys) = std::str::from_utf8(numkeys).unwrap_or("").parse::<usize>()
        {
            for key in argv.iter().skip(3).take(numkeys) {
                keys.push(key.clone());
            }
        }
        return keys;
    }

    let Some(KeySpec { first, last, step }) = key_spec(&name) else {
        return keys;
    };

    let last = if last < 0 {
        let from_end = (-last - 1) as usize;
        match argv.len().checked_sub(1 + from_end) {
            Some(last) => last,
            None => return keys,
        }
    } else {
        last as usize
    };

    let mut index = first;
    while index <= last {
        match argv.get(index) {
            Some(key) => keys.push(key.clone()),
            None => break,
        }
        index += step;
    }

    keys
}
