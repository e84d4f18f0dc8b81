//! Material node
//!
//! Sets the backend material for its subtree and puts the enclosing
//! material back once the subtree has been visited.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{Material, MaterialBackend, MATERIAL_BACKEND};
use crate::core::SceneError;
use crate::scene::{Node, NodeArg};

/// Create a material node
///
/// The first argument configures any of `ambient`, `diffuse`, `specular`
/// and `shininess` as `{r, g, b}` maps; missing ones take the default
/// material's values. The rest are children.
pub fn material(args: Vec<NodeArg>) -> Result<Node, SceneError> {
    let saved: Rc<RefCell<Vec<Material>>> = Rc::default();
    let restore = Rc::clone(&saved);

    let node = Node::extend(args, Material::default().to_params())?
        .with_kind("material")
        .on_pre_visit(move |ctx| {
            let backend = ctx.backend_as::<MaterialBackend>(MATERIAL_BACKEND)?;
            let material = Material::from_params(ctx.params()).map_err(|e| ctx.fatal_error(e))?;
            saved.borrow_mut().push(backend.material());
            backend.set_material(material);
            Ok(())
        })
        .on_post_visit(move |ctx| {
            let backend = ctx.backend_as::<MaterialBackend>(MATERIAL_BACKEND)?;
            if let Some(previous) = restore.borrow_mut().pop() {
                backend.set_material(previous);
            }
            Ok(())
        });
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendRegistry, Color};
    use crate::events::EventBus;
    use crate::scene::{DataScope, GraphContext, Params, Traversal, TraversalMode};

    #[test]
    fn test_material_applies_to_subtree_only() {
        let events = EventBus::new();
        let backends = BackendRegistry::new(events.clone());
        let backend = backends.install_backend(MaterialBackend::new()).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let probe = |seen: &Rc<RefCell<Vec<Color>>>| {
            let seen = Rc::clone(seen);
            Node::empty().on_pre_visit(move |ctx| {
                let backend = ctx.backend_as::<MaterialBackend>(MATERIAL_BACKEND)?;
                seen.borrow_mut().push(backend.material().diffuse);
                Ok(())
            })
        };

        let red = Params::new().with("diffuse", Params::new().with("r", 1.0));
        let root = Node::new(vec![
            Params::new().into(),
            material(vec![red.into(), probe(&seen).into()]).unwrap().into(),
            probe(&seen).into(),
        ])
        .unwrap();

        Traversal::new(TraversalMode::Render, &events, &backends)
            .run(&root, &mut GraphContext::new(), &Rc::new(DataScope::default()))
            .unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![Color::new(1.0, 0.0, 0.0), Material::default().diffuse]
        );
        assert_eq!(backend.material(), Material::default());
    }

    #[test]
    fn test_material_without_backend_fails() {
        let events = EventBus::new();
        let backends = BackendRegistry::new(events.clone());
        let root = material(vec![Params::new().into()]).unwrap();

        let result = Traversal::new(TraversalMode::Render, &events, &backends).run(
            &root,
            &mut GraphContext::new(),
            &Rc::new(DataScope::default()),
        );
        assert!(matches!(result, Err(SceneError::BackendNotFound(_))));
    }
}
