//! Scene-level integration tests
//!
//! Exercise whole scenes through the engine: lifecycle, the render loop on
//! a virtual clock, and the two-pass pick protocol.

mod pick;

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::{EngineConfig, SceneError};
use crate::engine::SceneEngine;
use crate::foundation::time::TimerQueue;
use crate::scene::Node;

type Log = Rc<RefCell<Vec<String>>>;

fn engine() -> (SceneEngine, Rc<TimerQueue>) {
    SceneEngine::with_timer_queue(EngineConfig::default()).unwrap()
}

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// Leaf that logs every render-mode visit
fn drawing(log: &Log, name: &'static str) -> Node {
    let log = Rc::clone(log);
    Node::empty().on_pre_visit(move |ctx| -> Result<(), SceneError> {
        if !ctx.is_picking() {
            log.borrow_mut().push(format!("draw {name}"));
        }
        Ok(())
    })
}
