use std::rc::Rc;
use std::time::Duration;

use super::*;
use crate::scene::{Params, PickedEvent, Scene, StartOptions};

/// Geometry leaf that reports a hit in pick mode when `solid`
fn geometry(log: &Log, name: &'static str, solid: bool) -> Node {
    let log = Rc::clone(log);
    let picked_log = Rc::clone(&log);
    Node::empty()
        .on_pre_visit(move |ctx| {
            if ctx.is_picking() {
                if solid && ctx.report_hit() {
                    log.borrow_mut().push(format!("hit {name}"));
                }
            } else {
                log.borrow_mut().push(format!("draw {name}"));
            }
            Ok(())
        })
        .on_picked(move |_, _| {
            picked_log.borrow_mut().push(format!("picked {name}"));
            Ok(())
        })
}

fn group(log: &Log, name: &'static str, child: Node) -> Node {
    let log = Rc::clone(log);
    Node::empty()
        .with_child(child)
        .on_picked(move |event, _| {
            log.borrow_mut().push(format!("picked {name} at ({}, {})", event.x, event.y));
            Ok(())
        })
}

fn two_groups(engine: &SceneEngine, log: &Log, left_solid: bool, right_solid: bool) -> Scene {
    engine
        .create_scene(vec![
            Params::new().into(),
            group(log, "left", geometry(log, "a", left_solid)).into(),
            group(log, "right", geometry(log, "b", right_solid)).into(),
        ])
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_notifies_only_the_hit_path() {
        let (engine, _timers) = engine();
        let log = new_log();
        let scene = two_groups(&engine, &log, true, false);
        scene.render().unwrap();
        log.borrow_mut().clear();

        let hit = scene.pick(3.0, 4.0).unwrap();
        assert_eq!(
            hit,
            Some(PickedEvent {
                x: 3.0,
                y: 4.0,
                path: vec![0, 0],
            })
        );
        assert_eq!(
            entries(&log),
            vec![
                "hit a",
                "picked left at (3, 4)",
                "picked a",
                "draw a",
                "draw b",
            ]
        );
        assert_eq!(scene.last_pick(), hit);
        assert_eq!(engine.active_scene(), None);
    }

    #[test]
    fn test_last_hit_in_traversal_order_wins() {
        let (engine, _timers) = engine();
        let log = new_log();
        let scene = two_groups(&engine, &log, true, true);
        scene.render().unwrap();

        let hit = scene.pick(0.0, 0.0).unwrap().unwrap();
        assert_eq!(hit.path, vec![1, 0]);
        assert!(!entries(&log).contains(&"picked a".to_string()));
        assert!(entries(&log).contains(&"picked b".to_string()));
    }

    #[test]
    fn test_miss_notifies_nobody() {
        let (engine, _timers) = engine();
        let log = new_log();
        let scene = two_groups(&engine, &log, false, false);
        scene.render().unwrap();
        log.borrow_mut().clear();

        assert_eq!(scene.pick(1.0, 1.0).unwrap(), None);
        assert_eq!(entries(&log), vec!["draw a", "draw b"]);
    }

    #[test]
    fn test_pick_requires_a_rendered_scene() {
        let (engine, _timers) = engine();
        let log = new_log();
        let scene = two_groups(&engine, &log, true, false);
        assert!(matches!(scene.pick(0.0, 0.0), Err(SceneError::InvalidSceneGraph(_))));

        scene.render().unwrap();
        scene.destroy().unwrap();
        assert!(matches!(scene.pick(0.0, 0.0), Err(SceneError::InvalidSceneGraph(_))));
        assert!(entries(&log).iter().all(|entry| !entry.starts_with("picked")));
    }

    #[test]
    fn test_pick_on_running_loop_is_served_by_next_frame() {
        let (engine, timers) = engine();
        let log = new_log();
        let scene = two_groups(&engine, &log, true, false);
        scene.start(StartOptions::new().with_fps(20.0)).unwrap();
        timers.advance(Duration::from_millis(50));
        log.borrow_mut().clear();

        assert_eq!(scene.pick(5.0, 6.0).unwrap(), None);
        assert!(entries(&log).is_empty());

        timers.advance(Duration::from_millis(50));
        assert_eq!(scene.last_pick().map(|event| event.path), Some(vec![0, 0]));
        assert_eq!(
            entries(&log),
            vec![
                "hit a",
                "picked left at (5, 6)",
                "picked a",
                "draw a",
                "draw b",
            ]
        );

        // The pick is consumed
        log.borrow_mut().clear();
        timers.advance(Duration::from_millis(50));
        assert_eq!(entries(&log), vec!["draw a", "draw b"]);
        scene.stop();
    }
}
