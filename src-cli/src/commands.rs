//! Subcommand handlers

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::io::Write;

use oplog_core::{OpId, OpLogStore, Operation};

pub async fn init(store: &OpLogStore) -> Result<()> {
    store
        .open_db()
        .await
        .context("failed to initialize operation log")?;

    println!("Initialized {}", store.config().data_dir.display());
    Ok(())
}

pub async fn append(store: &OpLogStore, id: OpId, fields: &[String]) -> Result<()> {
    let op = build_operation(id, fields)?;
    let op_id = op.id.clone();

    store
        .append_op(op)
        .await
        .with_context(|| format!("failed to append operation {op_id}"))?;

    tracing::info!(op_id = %op_id, "Appended operation");
    Ok(())
}

pub async fn set(store: &OpLogStore, key: String, value: String, actor: String) -> Result<()> {
    let op = Operation::set(key, value, actor);
    let op_id = op.id.clone();

    store
        .append_op(op)
        .await
        .with_context(|| format!("failed to append operation {op_id}"))?;

    println!("{op_id}");
    Ok(())
}

pub async fn get<W: Write>(store: &OpLogStore, key: &str, out: &mut W) -> Result<()> {
    let state = store
        .load_state()
        .await
        .context("failed to load operations")?;

    let Some(value) = state.get(key) else {
        bail!("key `{key}` not found");
    };
    writeln!(out, "{value}")?;
    Ok(())
}

pub async fn list<W: Write>(store: &OpLogStore, out: &mut W) -> Result<()> {
    let ops = store
        .load_ops()
        .await
        .context("failed to load operations")?;

    for op in &ops {
        writeln!(out, "{}", op.to_json()?)?;
    }
    Ok(())
}

fn build_operation(id: OpId, fields: &[String]) -> Result<Operation> {
    let mut op = Operation::new(id);

    for field in fields {
        let Some((key, raw)) = field.split_once('=') else {
            bail!("field `{field}` is not in KEY=VALUE form");
        };
        if key.is_empty() {
            bail!("field `{field}` has an empty key");
        }
        if key == "id" {
            bail!("use --id to set the record id");
        }

        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        op = op.with_field(key, value);
    }

    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oplog_core::{Backend, Config};
    use serde_json::json;

    #[test]
    fn test_build_operation_types_values() {
        let fields = vec![
            "op=a".to_string(),
            "count=3".to_string(),
            "tags=[\"x\"]".to_string(),
            "note=hello world".to_string(),
        ];
        let op = build_operation(OpId::Int(1), &fields).unwrap();

        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"id": 1, "op": "a", "count": 3, "tags": ["x"], "note": "hello world"})
        );
    }

    #[test]
    fn test_build_operation_rejects_bad_fields() {
        assert!(build_operation(OpId::Int(1), &["novalue".to_string()]).is_err());
        assert!(build_operation(OpId::Int(1), &["=x".to_string()]).is_err());
        assert!(build_operation(OpId::Int(1), &["id=2".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_append_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = OpLogStore::new(Config::new(dir.path().to_path_buf()).with_backend(Backend::File));

        append(&store, OpId::Int(2), &["op=b".to_string()]).await.unwrap();
        append(&store, OpId::Int(1), &["op=a".to_string()]).await.unwrap();
        append(&store, OpId::Int(1), &["op=c".to_string()]).await.unwrap();

        let mut out = Vec::new();
        list(&store, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\"id\":1,\"op\":\"c\"}\n{\"id\":2,\"op\":\"b\"}\n");
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = OpLogStore::new(Config::new(dir.path().to_path_buf()));

        set(&store, "welcome".into(), "first".into(), "local-device".into())
            .await
            .unwrap();
        set(&store, "welcome".into(), "second".into(), "local-device".into())
            .await
            .unwrap();

        let mut out = Vec::new();
        get(&store, "welcome", &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "second\n");

        let mut out = Vec::new();
        assert!(get(&store, "missing", &mut out).await.is_err());
    }
}
