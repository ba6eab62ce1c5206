//! Declarative Redis command table.
//!
//! Maps command names to argument-extraction templates. Adding a command
//! is a table entry; one generic routine interprets the templates. The
//! table covers the commonly traced command set, not every command Redis
//! ships. Unlisted commands still parse at the grammar level, they just
//! carry no structured arguments.

use serde_json::{Map, Value as Json};

/// Shape of one positional argument in a command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgFormat {
    /// Exactly one scalar.
    Fixed,
    /// One or more scalars collected into an array. Consumes every
    /// remaining argument not claimed by later fixed arguments.
    Repeating,
    /// Zero or one scalar.
    Optional,
}

/// One named argument slot in a command template.
#[derive(Debug, Clone, Copy)]
pub struct ArgDesc {
    pub name: &'static str,
    pub format: ArgFormat,
}

const fn fixed(name: &'static str) -> ArgDesc {
    ArgDesc {
        name,
        format: ArgFormat::Fixed,
    }
}

const fn rep(name: &'static str) -> ArgDesc {
    ArgDesc {
        name,
        format: ArgFormat::Repeating,
    }
}

const fn opt(name: &'static str) -> ArgDesc {
    ArgDesc {
        name,
        format: ArgFormat::Optional,
    }
}

/// Command table: canonical uppercase name (two tokens for multi-word
/// families) and the argument template. Argument names follow the Redis
/// documentation.
static COMMANDS: &[(&str, &[ArgDesc])] = &[
    // ACL family
    ("ACL CAT", &[opt("categoryname")]),
    ("ACL DELUSER", &[rep("username")]),
    ("ACL GENPASS", &[opt("bits")]),
    ("ACL GETUSER", &[fixed("username")]),
    ("ACL HELP", &[]),
    ("ACL LIST", &[]),
    ("ACL LOAD", &[]),
    ("ACL SAVE", &[]),
    ("ACL SETUSER", &[fixed("username"), rep("rule")]),
    ("ACL USERS", &[]),
    ("ACL WHOAMI", &[]),
    // Strings
    ("APPEND", &[fixed("key"), fixed("value")]),
    ("DECR", &[fixed("key")]),
    ("DECRBY", &[fixed("key"), fixed("decrement")]),
    ("GET", &[fixed("key")]),
    ("GETDEL", &[fixed("key")]),
    ("GETRANGE", &[fixed("key"), fixed("start"), fixed("end")]),
    ("GETSET", &[fixed("key"), fixed("value")]),
    ("INCR", &[fixed("key")]),
    ("INCRBY", &[fixed("key"), fixed("increment")]),
    ("INCRBYFLOAT", &[fixed("key"), fixed("increment")]),
    ("MGET", &[rep("key")]),
    ("PSETEX", &[fixed("key"), fixed("milliseconds"), fixed("value")]),
    ("SETEX", &[fixed("key"), fixed("seconds"), fixed("value")]),
    ("SETNX", &[fixed("key"), fixed("value")]),
    ("SETRANGE", &[fixed("key"), fixed("offset"), fixed("value")]),
    ("STRLEN", &[fixed("key")]),
    ("SUBSTR", &[fixed("key"), fixed("start"), fixed("end")]),
    // Keys
    ("DEL", &[rep("key")]),
    ("DUMP", &[fixed("key")]),
    ("EXISTS", &[rep("key")]),
    ("EXPIRE", &[fixed("key"), fixed("seconds")]),
    ("EXPIREAT", &[fixed("key"), fixed("timestamp")]),
    ("KEYS", &[fixed("pattern")]),
    ("PERSIST", &[fixed("key")]),
    ("PEXPIRE", &[fixed("key"), fixed("milliseconds")]),
    ("PEXPIREAT", &[fixed("key"), fixed("milliseconds-timestamp")]),
    ("PTTL", &[fixed("key")]),
    ("RANDOMKEY", &[]),
    ("RENAME", &[fixed("key"), fixed("newkey")]),
    ("RENAMENX", &[fixed("key"), fixed("newkey")]),
    ("TOUCH", &[rep("key")]),
    ("TTL", &[fixed("key")]),
    ("TYPE", &[fixed("key")]),
    ("UNLINK", &[rep("key")]),
    // Lists
    ("BLPOP", &[rep("key"), fixed("timeout")]),
    ("BRPOP", &[rep("key"), fixed("timeout")]),
    ("BRPOPLPUSH", &[fixed("source"), fixed("destination"), fixed("timeout")]),
    ("LINDEX", &[fixed("key"), fixed("index")]),
    ("LLEN", &[fixed("key")]),
    ("LPOP", &[fixed("key"), opt("count")]),
    ("LPUSH", &[fixed("key"), rep("element")]),
    ("LPUSHX", &[fixed("key"), rep("element")]),
    ("LRANGE", &[fixed("key"), fixed("start"), fixed("stop")]),
    ("LREM", &[fixed("key"), fixed("count"), fixed("element")]),
    ("LSET", &[fixed("key"), fixed("index"), fixed("element")]),
    ("LTRIM", &[fixed("key"), fixed("start"), fixed("stop")]),
    ("RPOP", &[fixed("key"), opt("count")]),
    ("RPOPLPUSH", &[fixed("source"), fixed("destination")]),
    ("RPUSH", &[fixed("key"), rep("element")]),
    ("RPUSHX", &[fixed("key"), rep("element")]),
    // Hashes
    ("HDEL", &[fixed("key"), rep("field")]),
    ("HEXISTS", &[fixed("key"), fixed("field")]),
    ("HGET", &[fixed("key"), fixed("field")]),
    ("HGETALL", &[fixed("key")]),
    ("HINCRBY", &[fixed("key"), fixed("field"), fixed("increment")]),
    ("HKEYS", &[fixed("key")]),
    ("HLEN", &[fixed("key")]),
    ("HMGET", &[fixed("key"), rep("field")]),
    ("HSETNX", &[fixed("key"), fixed("field"), fixed("value")]),
    ("HSTRLEN", &[fixed("key"), fixed("field")]),
    ("HVALS", &[fixed("key")]),
    // Sets
    ("SADD", &[fixed("key"), rep("member")]),
    ("SCARD", &[fixed("key")]),
    ("SDIFF", &[rep("key")]),
    ("SDIFFSTORE", &[fixed("destination"), rep("key")]),
    ("SINTER", &[rep("key")]),
    ("SINTERSTORE", &[fixed("destination"), rep("key")]),
    ("SISMEMBER", &[fixed("key"), fixed("member")]),
    ("SMEMBERS", &[fixed("key")]),
    ("SMOVE", &[fixed("source"), fixed("destination"), fixed("member")]),
    ("SPOP", &[fixed("key"), opt("count")]),
    ("SRANDMEMBER", &[fixed("key"), opt("count")]),
    ("SREM", &[fixed("key"), rep("member")]),
    ("SUNION", &[rep("key")]),
    ("SUNIONSTORE", &[fixed("destination"), rep("key")]),
    // Sorted sets
    ("ZCARD", &[fixed("key")]),
    ("ZCOUNT", &[fixed("key"), fixed("min"), fixed("max")]),
    ("ZINCRBY", &[fixed("key"), fixed("increment"), fixed("member")]),
    ("ZPOPMAX", &[fixed("key"), opt("count")]),
    ("ZPOPMIN", &[fixed("key"), opt("count")]),
    ("ZRANGE", &[fixed("key"), fixed("start"), fixed("stop")]),
    ("ZRANK", &[fixed("key"), fixed("member")]),
    ("ZREM", &[fixed("key"), rep("member")]),
    ("ZSCORE", &[fixed("key"), fixed("member")]),
    // Streams
    ("XACK", &[fixed("key"), fixed("group"), rep("id")]),
    ("XDEL", &[fixed("key"), rep("id")]),
    ("XLEN", &[fixed("key")]),
    // Pub/sub
    ("PSUBSCRIBE", &[rep("pattern")]),
    ("PUBLISH", &[fixed("channel"), fixed("message")]),
    ("PUNSUBSCRIBE", &[rep("pattern")]),
    ("SUBSCRIBE", &[rep("channel")]),
    ("UNSUBSCRIBE", &[rep("channel")]),
    // Connection
    ("AUTH", &[fixed("password")]),
    ("ECHO", &[fixed("message")]),
    ("PING", &[opt("message")]),
    ("QUIT", &[]),
    ("SELECT", &[fixed("index")]),
    // CLIENT family
    ("CLIENT GETNAME", &[]),
    ("CLIENT ID", &[]),
    ("CLIENT LIST", &[]),
    ("CLIENT SETNAME", &[fixed("connection-name")]),
    // CONFIG family
    ("CONFIG GET", &[fixed("parameter")]),
    ("CONFIG RESETSTAT", &[]),
    ("CONFIG REWRITE", &[]),
    ("CONFIG SET", &[fixed("parameter"), fixed("value")]),
    // MEMORY family
    ("MEMORY DOCTOR", &[]),
    ("MEMORY USAGE", &[fixed("key")]),
    // Server
    ("COMMAND", &[]),
    ("DBSIZE", &[]),
    ("FLUSHALL", &[opt("async")]),
    ("FLUSHDB", &[opt("async")]),
    ("LASTSAVE", &[]),
    ("SAVE", &[]),
    ("TIME", &[]),
];

/// Result of matching the leading tokens of a request against the table.
#[derive(Debug, Clone, Copy)]
pub struct CommandMatch {
    /// Canonical uppercase command name.
    pub name: &'static str,
    /// Argument template for the remaining tokens.
    pub args: &'static [ArgDesc],
    /// How many leading tokens the name consumed (1, or 2 for a
    /// multi-word command spelled as separate tokens).
    pub tokens_consumed: usize,
}

fn find(name: &str) -> Option<(&'static str, &'static [ArgDesc])> {
    COMMANDS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .copied()
}

/// Look up a command by its leading tokens, case-insensitively.
///
/// The first token alone is tried first (it may already contain a space,
/// e.g. a client sending "acl getuser" as one bulk string); then the
/// first two tokens joined by a space.
pub fn lookup(first: &str, second: Option<&str>) -> Option<CommandMatch> {
    if let Some((name, args)) = find(first) {
        return Some(CommandMatch {
            name,
            args,
            tokens_consumed: 1,
        });
    }
    if let Some(second) = second {
        let joined = format!("{first} {second}");
        if let Some((name, args)) = find(&joined) {
            return Some(CommandMatch {
                name,
                args,
                tokens_consumed: 2,
            });
        }
    }
    None
}

/// Fit positional arguments to a template, producing a JSON object with
/// one entry per template slot in template order.
///
/// Returns `None` when the arguments cannot fit (too few, too many, or
/// an empty repeating group).
pub fn extract_args(descs: &[ArgDesc], args: &[&str]) -> Option<Json> {
    let mut map = Map::new();
    let mut idx = 0;

    for (i, desc) in descs.iter().enumerate() {
        // Arguments that later fixed slots are guaranteed to claim.
        let reserved = descs[i + 1..]
            .iter()
            .filter(|d| d.format == ArgFormat::Fixed)
            .count();
        let remaining = args.len().checked_sub(idx + reserved);

        match desc.format {
            ArgFormat::Fixed => {
                if idx >= args.len() {
                    return None;
                }
                map.insert(desc.name.to_string(), Json::String(args[idx].to_string()));
                idx += 1;
            }
            ArgFormat::Optional => {
                if remaining? > 0 {
                    map.insert(desc.name.to_string(), Json::String(args[idx].to_string()));
                    idx += 1;
                }
            }
            ArgFormat::Repeating => {
                let take = remaining?;
                if take == 0 {
                    return None;
                }
                let group: Vec<Json> = args[idx..idx + take]
                    .iter()
                    .map(|a| Json::String(a.to_string()))
                    .collect();
                map.insert(desc.name.to_string(), Json::Array(group));
                idx += take;
            }
        }
    }

    if idx != args.len() {
        return None;
    }
    Some(Json::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(cmd: &str, args: &[&str]) -> Option<String> {
        let m = lookup(cmd, None)?;
        extract_args(m.args, args).map(|v| v.to_string())
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("lpush", None).unwrap().name, "LPUSH");
        assert_eq!(lookup("LpUsH", None).unwrap().name, "LPUSH");
    }

    #[test]
    fn test_lookup_two_token_family() {
        let m = lookup("ACL", Some("LOAD")).unwrap();
        assert_eq!(m.name, "ACL LOAD");
        assert_eq!(m.tokens_consumed, 2);
    }

    #[test]
    fn test_lookup_spaced_single_token() {
        let m = lookup("acl getuser", None).unwrap();
        assert_eq!(m.name, "ACL GETUSER");
        assert_eq!(m.tokens_consumed, 1);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("NOSUCHCMD", None).is_none());
        assert!(lookup("ACL", Some("NOSUCH")).is_none());
    }

    #[test]
    fn test_fixed_args() {
        assert_eq!(
            extract("APPEND", &["foo", "bar"]).unwrap(),
            r#"{"key":"foo","value":"bar"}"#
        );
        assert_eq!(
            extract("BRPOPLPUSH", &["src", "dest", "10"]).unwrap(),
            r#"{"source":"src","destination":"dest","timeout":"10"}"#
        );
    }

    #[test]
    fn test_repeating_args() {
        assert_eq!(
            extract("LPUSH", &["foo", "bar0", "bar1"]).unwrap(),
            r#"{"key":"foo","element":["bar0","bar1"]}"#
        );
        assert_eq!(
            extract("DEL", &["a", "b", "c"]).unwrap(),
            r#"{"key":["a","b","c"]}"#
        );
    }

    #[test]
    fn test_repeating_followed_by_fixed() {
        assert_eq!(
            extract("BLPOP", &["k1", "k2", "5"]).unwrap(),
            r#"{"key":["k1","k2"],"timeout":"5"}"#
        );
    }

    #[test]
    fn test_optional_arg() {
        assert_eq!(
            extract("ZPOPMAX", &["foo", "10"]).unwrap(),
            r#"{"key":"foo","count":"10"}"#
        );
        assert_eq!(extract("ZPOPMAX", &["foo"]).unwrap(), r#"{"key":"foo"}"#);
    }

    #[test]
    fn test_empty_template() {
        assert_eq!(extract("TIME", &[]).unwrap(), "{}");
    }

    #[test]
    fn test_mismatches() {
        // Too few
        assert!(extract("APPEND", &["foo"]).is_none());
        // Too many
        assert!(extract("GET", &["foo", "bar"]).is_none());
        // Empty repeating group
        assert!(extract("LPUSH", &["foo"]).is_none());
        assert!(extract("BLPOP", &["5"]).is_none());
    }
}
