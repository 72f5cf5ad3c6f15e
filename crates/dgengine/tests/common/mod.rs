// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixture nodes shared by the integration tests.

#![allow(dead_code, missing_docs)]

use dgengine::value::{INT, NUMBER};
use dgengine::{
    Attribute, AttributeFlags, ComputeContext, ComputeError, Mode, Node, NodeType, NodeTypeBuilder, PlugRef, Result,
    Value,
};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, LazyLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a test subscriber once, honoring `RUST_LOG`
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Number of compute calls, shared between a test and the node it observes
pub type Counter = Rc<Cell<u32>>;

pub fn counter() -> Counter {
    Rc::new(Cell::new(0))
}

static ADD: LazyLock<Arc<NodeType>> = LazyLock::new(|| {
    NodeType::builder("Add")
        .register_plug("a", Attribute::new(&INT, AttributeFlags::NONE).with_default(0).unwrap())
        .and_then(|b| b.register_plug("b", Attribute::new(&INT, AttributeFlags::NONE).with_default(0).unwrap()))
        .and_then(|b| b.register_plug("sum", Attribute::new(&INT, AttributeFlags::NONE)))
        .and_then(|b| b.affects("a", "sum"))
        .and_then(|b| b.affects("b", "sum"))
        .map(NodeTypeBuilder::build)
        .unwrap()
});

/// `sum = a + b`
#[derive(Debug)]
pub struct Add {
    pub id: String,
    pub computed: Counter,
}

impl Add {
    pub fn new(id: &str) -> Self {
        Self::counted(id, counter())
    }

    pub fn counted(id: &str, computed: Counter) -> Self {
        Self {
            id: id.into(),
            computed,
        }
    }
}

impl Node for Add {
    fn id(&self) -> &str {
        &self.id
    }

    fn plugs(&self) -> Vec<PlugRef> {
        ADD.plug_refs()
    }

    fn compute(&self, ctx: &mut ComputeContext<'_>, plug: &PlugRef, mode: &Mode) -> Result<Value> {
        self.computed.set(self.computed.get() + 1);
        match plug.name() {
            "sum" => {
                let a = ctx.get("a", mode)?.as_int().unwrap_or_default();
                let b = ctx.get("b", mode)?.as_int().unwrap_or_default();
                Ok(Value::Int(a + b))
            }
            other => Err(ComputeError::unhandled(other).into()),
        }
    }

    fn duplicate(&self) -> Result<Box<dyn Node>> {
        Ok(Box::new(Add::new(&self.id)))
    }
}

static SCALE: LazyLock<Arc<NodeType>> = LazyLock::new(|| {
    NodeType::builder("Scale")
        .register_plug("x", Attribute::new(&NUMBER, AttributeFlags::NONE).with_default(1).unwrap())
        .and_then(|b| b.register_plug("factor", Attribute::new(&INT, AttributeFlags::NONE).with_default(2).unwrap()))
        .and_then(|b| b.register_plug("product", Attribute::new(&INT, AttributeFlags::NONE)))
        .and_then(|b| b.affects("x", "product"))
        .and_then(|b| b.affects("factor", "product"))
        .map(NodeTypeBuilder::build)
        .unwrap()
});

/// `product = x * factor`; refuses to compute for a zero factor
#[derive(Debug)]
pub struct Scale {
    pub id: String,
    pub computed: Counter,
}

impl Scale {
    pub fn new(id: &str) -> Self {
        Self::counted(id, counter())
    }

    pub fn counted(id: &str, computed: Counter) -> Self {
        Self {
            id: id.into(),
            computed,
        }
    }
}

impl Node for Scale {
    fn id(&self) -> &str {
        &self.id
    }

    fn plugs(&self) -> Vec<PlugRef> {
        SCALE.plug_refs()
    }

    fn compute(&self, ctx: &mut ComputeContext<'_>, plug: &PlugRef, mode: &Mode) -> Result<Value> {
        self.computed.set(self.computed.get() + 1);
        match plug.name() {
            "product" => {
                let x = ctx.get("x", mode)?.as_int().unwrap_or_default();
                let factor = ctx.get("factor", mode)?.as_int().unwrap_or_default();
                if factor == 0 {
                    return Err(ComputeError::failed("factor must not be zero").into());
                }
                Ok(Value::Int(x * factor))
            }
            other => Err(ComputeError::unhandled(other).into()),
        }
    }

    fn duplicate(&self) -> Result<Box<dyn Node>> {
        Ok(Box::new(Scale::new(&self.id)))
    }
}

static SINK: LazyLock<Arc<NodeType>> = LazyLock::new(|| {
    NodeType::builder("Sink")
        .register_plug("input", Attribute::new(&INT, AttributeFlags::NONE))
        .and_then(|b| b.register_plug("checked", Attribute::new(&INT, AttributeFlags::CHECK_PASSING_VALUES)))
        .map(NodeTypeBuilder::build)
        .unwrap()
});

/// Input-only node without defaults
#[derive(Debug)]
pub struct Sink {
    pub id: String,
}

impl Sink {
    pub fn new(id: &str) -> Self {
        Self { id: id.into() }
    }
}

impl Node for Sink {
    fn id(&self) -> &str {
        &self.id
    }

    fn plugs(&self) -> Vec<PlugRef> {
        SINK.plug_refs()
    }

    fn compute(&self, _ctx: &mut ComputeContext<'_>, plug: &PlugRef, _mode: &Mode) -> Result<Value> {
        Err(ComputeError::unhandled(plug.name()).into())
    }

    fn duplicate(&self) -> Result<Box<dyn Node>> {
        Ok(Box::new(Sink::new(&self.id)))
    }
}
