use std::sync::{Arc, Mutex};

use super::*;
use crate::asset::MetadataValue;
use crate::foundation::error::MadamError;
use crate::foundation::mime::MimeType;
use crate::operator::bound::Transform;

#[derive(Debug)]
struct Record {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Operator for Record {
    fn apply(&self, asset: Asset) -> MadamResult<Asset> {
        self.log.lock().unwrap().push(self.label);
        let mut essence = asset.essence_bytes().to_vec();
        essence.extend_from_slice(self.label.as_bytes());
        Ok(asset.with_essence(essence))
    }
}

#[derive(Debug)]
struct Fail;

impl Operator for Fail {
    fn apply(&self, _asset: Asset) -> MadamResult<Asset> {
        Err(MadamError::operator("boom"))
    }
}

/// Codec with a single parameterized transform.
#[derive(Clone, Debug)]
struct Stamp;

#[derive(Clone, Debug)]
enum StampOp {
    Set(&'static str),
}

impl Transform for Stamp {
    type Op = StampOp;

    fn transform(&self, asset: Asset, op: &StampOp) -> MadamResult<Asset> {
        match op {
            StampOp::Set(value) => Ok(asset.with("stamp", *value)),
        }
    }
}

fn asset(bytes: &[u8]) -> Asset {
    Asset::new(bytes.to_vec(), MimeType::parse("text/plain").unwrap())
}

#[test]
fn empty_pipeline_yields_inputs_unchanged() {
    let pipeline = Pipeline::new();
    let inputs = vec![asset(b"a"), asset(b"b"), asset(b"c")];
    let outputs: Vec<Asset> = pipeline
        .process(inputs.clone())
        .collect::<MadamResult<_>>()
        .unwrap();
    assert_eq!(outputs, inputs);
}

#[test]
fn operators_run_in_insertion_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = Pipeline::new();
    pipeline
        .add(Record {
            label: "first",
            log: log.clone(),
        })
        .add(Record {
            label: "second",
            log: log.clone(),
        });
    assert_eq!(pipeline.len(), 2);

    let out: Vec<Asset> = pipeline
        .process([asset(b"x:"), asset(b"y:")])
        .collect::<MadamResult<_>>()
        .unwrap();
    assert_eq!(out[0].essence_bytes(), b"x:firstsecond");
    assert_eq!(out[1].essence_bytes(), b"y:firstsecond");
    assert_eq!(*log.lock().unwrap(), ["first", "second", "first", "second"]);
}

#[test]
fn processing_is_lazy() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new().with(Record {
        label: "op",
        log: log.clone(),
    });

    let mut results = pipeline.process([asset(b"1"), asset(b"2")]);
    assert!(log.lock().unwrap().is_empty());
    results.next().unwrap().unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn failure_is_reported_per_asset() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new().with(Fail).with(Record {
        label: "after",
        log: log.clone(),
    });

    let results: Vec<_> = pipeline.process([asset(b"1"), asset(b"2")]).collect();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| matches!(r, Err(MadamError::Operator(_)))));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn bound_operators_are_reusable() {
    let stamp = Stamp.bind(StampOp::Set("ok"));
    let pipeline = Pipeline::new().with(stamp.clone()).with(stamp);

    for out in pipeline.process([asset(b"1"), asset(b"2")]) {
        let out = out.unwrap();
        assert_eq!(out.get("stamp").and_then(MetadataValue::as_str), Some("ok"));
    }
}

#[test]
fn pipelines_nest_as_operators() {
    let inner = Pipeline::new().with(Stamp.bind(StampOp::Set("inner")));
    let outer = Pipeline::new().with(inner);
    let out = outer.apply(asset(b"z")).unwrap();
    assert_eq!(out.get("stamp").and_then(MetadataValue::as_str), Some("inner"));
}
