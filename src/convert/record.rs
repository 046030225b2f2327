//! Unified-log record format.
//!
//! One `\n`-delimited UTF-8 line per mutation:
//!
//! ```text
//! add_vertex|<epoch>|<gid>|<prop1>|<prop2>|...
//! add_edge|<epoch>|<elabel_local>|<src_gid>|<dst_gid>|<prop1>|...
//! ```
//!
//! Numbers are decimal, strings raw. The delimiter is forbidden inside
//! string properties (the translator rejects such values at ingest), so
//! every emitted line parses unambiguously.

use std::fmt;

use crate::error::{GraphError, Result};
use crate::types::{ELabelId, Epoch, Gid};

/// One mutation in the unified log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A new vertex with its property values in schema order.
    AddVertex {
        /// Epoch the mutation belongs to.
        epoch: Epoch,
        /// Allocated global id.
        gid: Gid,
        /// Formatted property values.
        props: Vec<String>,
    },
    /// A new edge between two previously translated vertices.
    AddEdge {
        /// Epoch the mutation belongs to.
        epoch: Epoch,
        /// Local edge label id.
        elabel: ELabelId,
        /// Source endpoint.
        src: Gid,
        /// Destination endpoint.
        dst: Gid,
        /// Formatted property values.
        props: Vec<String>,
    },
}

impl LogRecord {
    /// Epoch tag of the record.
    pub fn epoch(&self) -> Epoch {
        match self {
            LogRecord::AddVertex { epoch, .. } | LogRecord::AddEdge { epoch, .. } => *epoch,
        }
    }

    /// Parses one unified-log line.
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split('|');
        let op = fields
            .next()
            .ok_or_else(|| GraphError::Parse("empty log line".into()))?;
        match op {
            "add_vertex" => {
                let epoch = parse_u64(fields.next(), "epoch")?;
                let gid = Gid(parse_u64(fields.next(), "gid")?);
                let props = fields.map(str::to_owned).collect();
                Ok(LogRecord::AddVertex { epoch, gid, props })
            }
            "add_edge" => {
                let epoch = parse_u64(fields.next(), "epoch")?;
                let elabel = ELabelId(parse_u64(fields.next(), "edge label")? as u32);
                let src = Gid(parse_u64(fields.next(), "src gid")?);
                let dst = Gid(parse_u64(fields.next(), "dst gid")?);
                let props = fields.map(str::to_owned).collect();
                Ok(LogRecord::AddEdge {
                    epoch,
                    elabel,
                    src,
                    dst,
                    props,
                })
            }
            other => Err(GraphError::Parse(format!("unknown log operation {other:?}"))),
        }
    }
}

fn parse_u64(field: Option<&str>, what: &str) -> Result<u64> {
    let raw = field.ok_or_else(|| GraphError::Parse(format!("log line missing {what}")))?;
    raw.parse()
        .map_err(|_| GraphError::Parse(format!("bad {what} field {raw:?}")))
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::AddVertex { epoch, gid, props } => {
                write!(f, "add_vertex|{epoch}|{gid}")?;
                for prop in props {
                    write!(f, "|{prop}")?;
                }
                Ok(())
            }
            LogRecord::AddEdge {
                epoch,
                elabel,
                src,
                dst,
                props,
            } => {
                write!(f, "add_edge|{epoch}|{elabel}|{src}|{dst}")?;
                for prop in props {
                    write!(f, "|{prop}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_line_round_trips() {
        let record = LogRecord::AddVertex {
            epoch: 3,
            gid: Gid(42),
            props: vec!["A".into(), "17".into()],
        };
        let line = record.to_string();
        assert_eq!(line, "add_vertex|3|42|A|17");
        assert_eq!(LogRecord::parse(&line).unwrap(), record);
    }

    #[test]
    fn edge_line_round_trips() {
        let record = LogRecord::AddEdge {
            epoch: 1,
            elabel: ELabelId(0),
            src: Gid(7),
            dst: Gid(9),
            props: vec![],
        };
        let line = record.to_string();
        assert_eq!(line, "add_edge|1|0|7|9");
        assert_eq!(LogRecord::parse(&line).unwrap(), record);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(LogRecord::parse("").is_err());
        assert!(LogRecord::parse("drop_vertex|0|1").is_err());
        assert!(LogRecord::parse("add_vertex|x|1").is_err());
        assert!(LogRecord::parse("add_edge|0|0|7").is_err());
    }
}
