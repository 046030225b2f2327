#![allow(missing_docs)]

use std::sync::Arc;

use tessera::convert::{BinlogTranslator, LogRecord, TranslatorOptions};
use tessera::meta::{self, MemoryRegistry, MetaRegistry};
use tessera::schema::rgmapping::RgMapping;
use tessera::schema::GraphSchema;
use tessera::store::{decode_string_cell, GraphStore, GraphStoreOptions, GraphWriter};
use tessera::VLabelId;

const MAPPING: &str = r#"{
    "vertexLabelNum": 1,
    "types": [
        {
            "type": "VERTEX", "id": 0,
            "table_name": "person", "label": "person",
            "id_column_name": "id",
            "propertyDefList": [{"column_name": "name"}]
        },
        {
            "type": "EDGE", "id": 1,
            "table_name": "knows", "label": "knows",
            "rawRelationShips": [{
                "srcVertexLabel": "person",
                "dstVertexLabel": "person",
                "src_column_name": "a",
                "dst_column_name": "b"
            }],
            "propertyDefList": []
        }
    ]
}"#;

fn partition_store(partition: u32, registry: Arc<MemoryRegistry>) -> Arc<GraphStore> {
    let mapping = RgMapping::from_json(MAPPING).unwrap();
    let schema = GraphSchema::from_mapping(&mapping, 16).unwrap();
    Arc::new(
        GraphStore::new(
            schema,
            GraphStoreOptions {
                partition,
                machine: 0,
                total_partitions: 2,
                vertex_capacity: 64,
                rows_per_page: 4,
                meta_prefix: "e2e_".into(),
            },
            registry,
        )
        .unwrap(),
    )
}

#[test]
fn change_stream_to_snapshot_reads() {
    let mapping = RgMapping::from_json(MAPPING).unwrap();
    let mut translator = BinlogTranslator::new(
        &mapping,
        TranslatorOptions {
            partitions: 2,
            logs_per_epoch: 2,
        },
    )
    .unwrap();

    let events = [
        r#"{"type":"insert","table":"person","data":{"id":10,"name":"A"}}"#,
        r#"{"type":"insert","table":"person","data":{"id":20,"name":"B"}}"#,
        r#"{"type":"insert","table":"person","data":{"id":30,"name":"C"}}"#,
        r#"{"type":"insert","table":"knows","data":{"a":10,"b":30}}"#,
    ];
    let records: Vec<LogRecord> = events
        .iter()
        .map(|e| translator.translate(e).unwrap().expect("mapped"))
        .collect();

    // Every partition's writer consumes the full unified log and keeps what
    // it owns, mirroring the rest.
    let registry = Arc::new(MemoryRegistry::new());
    let stores: Vec<Arc<GraphStore>> = (0..2)
        .map(|p| partition_store(p, registry.clone()))
        .collect();
    for store in &stores {
        store.put_schema().unwrap();
        let mut writer = GraphWriter::new(store.clone());
        for record in &records {
            writer.apply(record).unwrap();
        }
        writer.finish().unwrap();
    }

    // Both partitions sealed epoch 1; readers negotiate their start there.
    let epoch = meta::negotiated_epoch(registry.as_ref(), "e2e_", 2).unwrap();
    assert_eq!(epoch, 1);

    // Partition 0 owns A (offset 0) and C (offset 1); B lives on partition 1.
    let p0 = &stores[0];
    let table = p0.vertex_table(VLabelId(0)).unwrap();
    assert_eq!(table.max_inner(), 2);
    let snapshot = p0.property_snapshot(VLabelId(0), epoch).unwrap();
    assert_eq!(decode_string_cell(&snapshot.get(0, 0).unwrap()), "A");
    assert_eq!(decode_string_cell(&snapshot.get(1, 0).unwrap()), "C");

    let p1 = &stores[1];
    assert_eq!(p1.vertex_table(VLabelId(0)).unwrap().max_inner(), 1);
    let snapshot = p1.property_snapshot(VLabelId(0), epoch).unwrap();
    assert_eq!(decode_string_cell(&snapshot.get(0, 0).unwrap()), "B");

    // The knows edge (A -> C) lives on partition 0, where A is inner.
    let parser = p0.parser();
    let neighbors: Vec<_> = p0
        .graph(VLabelId(0))
        .unwrap()
        .neighbors(0, epoch)
        .collect();
    assert_eq!(neighbors.len(), 1);
    assert_eq!(parser.offset(neighbors[0].dst), 1, "edge points at C");
    // Partition 1 sees the same edge from its mirror of A.
    assert_eq!(stores[1].ov_graph(VLabelId(0)).unwrap().degree(0, epoch), 1);

    // Blob history answers exactly the sealed epochs.
    assert!(p0.fetch_blob_schema(0).is_ok());
    assert!(p0.fetch_blob_schema(1).is_ok());
    assert!(p0.fetch_blob_schema(2).is_err());
    let blobs = p0.fetch_blob_schema(1).unwrap();
    assert_eq!(blobs[&0].visible_rows, 2);

    // Registry carries schema and blob payloads for both partitions.
    for p in 0..2 {
        assert!(registry.get(&meta::schema_key("e2e_", p)).unwrap().is_some());
        assert!(registry
            .get(&meta::blob_key("e2e_", 0, p, epoch))
            .unwrap()
            .is_some());
    }
}

#[test]
fn vertices_written_in_epoch_become_visible_when_it_seals() {
    let mapping = RgMapping::from_json(MAPPING).unwrap();
    let mut translator = BinlogTranslator::new(
        &mapping,
        TranslatorOptions {
            partitions: 1,
            logs_per_epoch: 2,
        },
    )
    .unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let mapping_schema = GraphSchema::from_mapping(&mapping, 16).unwrap();
    let store = Arc::new(
        GraphStore::new(
            mapping_schema,
            GraphStoreOptions {
                partition: 0,
                machine: 0,
                total_partitions: 1,
                vertex_capacity: 16,
                rows_per_page: 4,
                meta_prefix: String::new(),
            },
            registry,
        )
        .unwrap(),
    );
    let mut writer = GraphWriter::new(store.clone());

    for (id, name) in [(1, "A"), (2, "B")] {
        let line = format!(
            r#"{{"type":"insert","table":"person","data":{{"id":{id},"name":"{name}"}}}}"#
        );
        let record = translator.translate(&line).unwrap().unwrap();
        writer.apply(&record).unwrap();
    }
    // Epoch 0 is still open: no header flush has happened.
    let snapshot = store.property_snapshot(VLabelId(0), 0).unwrap();
    assert_eq!(snapshot.visible_rows(), 0);

    // A third record crosses into epoch 1 and seals epoch 0.
    let record = translator
        .translate(r#"{"type":"insert","table":"person","data":{"id":3,"name":"C"}}"#)
        .unwrap()
        .unwrap();
    assert_eq!(record.epoch(), 1);
    writer.apply(&record).unwrap();

    let snapshot = store.property_snapshot(VLabelId(0), 0).unwrap();
    assert_eq!(snapshot.visible_rows(), 2);
    let mut cursor = snapshot.cursor(0).unwrap();
    let mut names = Vec::new();
    while let Some((_, bytes)) = cursor.next_row() {
        names.push(decode_string_cell(&bytes));
    }
    assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
}
