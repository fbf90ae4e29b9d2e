//! Describing the active state as instructions and paths.

use crate::domain::endpoint::EndpointKind;
use crate::domain::instruction::{InstructionEndpoint, RoutingInstruction};
use crate::domain::parser::InstructionDescriber;
use crate::domain::scope::{RouterTree, ScopeId};

/// Active instructions below a scope with grouping endpoints spliced out.
///
/// Viewport scopes and `no_link` viewports contribute their children only.
/// Children of a viewport scope that repeat the scope's caught segment lose
/// their endpoint name, so parsing the description lets the scope catch
/// them again.
pub(crate) fn flatten(tree: &RouterTree, instructions: Vec<RoutingInstruction>) -> Vec<RoutingInstruction> {
    let mut out = Vec::new();
    for mut instruction in instructions {
        let children = flatten(tree, instruction.next_scope_instructions.take().unwrap_or_default());
        instruction.scope_modifier.clear();
        let kind = instruction
            .endpoint
            .id()
            .and_then(|id| tree.endpoint(id))
            .map(|endpoint| &endpoint.kind);

        match kind {
            Some(EndpointKind::ViewportScope(_)) => {
                let caught = instruction.component_name().to_string();
                out.extend(children.into_iter().map(|mut child| {
                    if child.component_name() == caught {
                        child.endpoint = InstructionEndpoint::None;
                    }
                    child
                }));
            }
            Some(EndpointKind::Viewport(options)) if options.no_link => out.extend(children),
            _ => {
                if !children.is_empty() {
                    instruction.next_scope_instructions = Some(children);
                }
                out.push(instruction);
            }
        }
    }
    out
}

/// Whether `wanted` (and its children) is part of `active`.
pub(crate) fn contains(active: &[RoutingInstruction], wanted: &RoutingInstruction) -> bool {
    active.iter().any(|candidate| {
        candidate.component_name() == wanted.component_name()
            && wanted
                .endpoint_name()
                .map_or(true, |name| candidate.endpoint_name() == Some(name))
            && (wanted.parameters.is_empty()
                || candidate.parameters.same(&wanted.parameters, &[]))
            && wanted
                .children()
                .iter()
                .all(|child| contains(candidate.children(), child))
    })
}

/// Titles of the active components below `scope`, parents first.
pub(crate) fn titles(tree: &RouterTree, scope: ScopeId) -> Vec<String> {
    let mut out = Vec::new();
    collect_titles(tree, &tree.active_instructions(scope), &mut out);
    out
}

fn collect_titles(tree: &RouterTree, instructions: &[RoutingInstruction], out: &mut Vec<String>) {
    for instruction in instructions {
        let title = instruction
            .endpoint
            .id()
            .and_then(|id| tree.endpoint(id))
            .and_then(|endpoint| endpoint.content().component.as_ref())
            .and_then(|component| component.title());
        out.extend(title);
        collect_titles(tree, instruction.children(), out);
    }
}

/// Leaves out what the endpoint tree implies: a viewport's default
/// component, and the name of a viewport that is alone in its scope.
pub(crate) struct PathDescriber<'a> {
    pub(crate) tree: &'a RouterTree,
}

impl InstructionDescriber for PathDescriber<'_> {
    fn suppress_component(&self, instruction: &RoutingInstruction) -> bool {
        let Some(options) = instruction
            .endpoint
            .id()
            .and_then(|id| self.tree.endpoint(id))
            .and_then(|endpoint| endpoint.kind.viewport_options())
        else {
            return false;
        };
        !options.force_description
            && instruction.parameters.is_empty()
            && options.default.as_deref() == Some(instruction.component_name())
    }

    fn suppress_endpoint(&self, instruction: &RoutingInstruction) -> bool {
        let Some(endpoint) = instruction.endpoint.id().and_then(|id| self.tree.endpoint(id)) else {
            return false;
        };
        if endpoint
            .kind
            .viewport_options()
            .map_or(true, |options| options.force_description)
        {
            return false;
        }
        let viewports = self
            .tree
            .endpoints_in(self.tree.owning_scope(endpoint.parent_scope))
            .into_iter()
            .filter(|id| self.tree.endpoint(*id).is_some_and(|e| e.is_viewport()))
            .count();
        viewports == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::Content;
    use crate::domain::endpoint::{EndpointId, ViewportOptions, ViewportScopeOptions};
    use crate::domain::navigation::NavigationFlags;
    use crate::domain::parser::InstructionParser;

    fn host(tree: &mut RouterTree, endpoint: EndpointId, component: &str) {
        let id = tree.next_content_id();
        let content = Content::new(id, RoutingInstruction::new(component), 1, None);
        tree.set_next_content(endpoint, content, NavigationFlags::NEW).unwrap();
        tree.finalize_content_change(endpoint, 1);
    }

    #[test]
    fn test_path_suppresses_implied_parts() {
        let mut tree = RouterTree::default();
        let root = tree.root();
        let main = tree
            .connect_endpoint(root, None, ViewportOptions::new("main").with_default("home").into())
            .unwrap()[0];
        host(&mut tree, main, "home");

        let parser = InstructionParser::default();
        let active = flatten(&tree, tree.active_instructions(root));
        assert_eq!(parser.stringify(&active), "home@main");
        assert_eq!(parser.stringify_with(&active, &PathDescriber { tree: &tree }, false), "");

        host(&mut tree, main, "about");
        let active = flatten(&tree, tree.active_instructions(root));
        assert_eq!(parser.stringify_with(&active, &PathDescriber { tree: &tree }, false), "about");
    }

    #[test]
    fn test_viewport_scopes_are_spliced_out() {
        let mut tree = RouterTree::default();
        let root = tree.root();
        let connected = tree
            .connect_endpoint(
                root,
                None,
                ViewportScopeOptions::new("group")
                    .catches(["item"])
                    .with_children(vec![ViewportOptions::new("slot").into()])
                    .into(),
            )
            .unwrap();
        let (group, slot) = (connected[0], connected[1]);
        host(&mut tree, group, "item");
        host(&mut tree, slot, "item");

        let active = flatten(&tree, tree.active_instructions(root));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].component_name(), "item");
        assert_eq!(active[0].endpoint_name(), None);
    }

    #[test]
    fn test_contains_checks_children_and_parameters() {
        let parser = InstructionParser::default();
        let active = parser.parse("a(1)@main/b@left").unwrap();
        assert!(contains(&active, &parser.parse("a").unwrap()[0]));
        assert!(contains(&active, &parser.parse("a(1)/b").unwrap()[0]));
        assert!(!contains(&active, &parser.parse("a(2)").unwrap()[0]));
        assert!(!contains(&active, &parser.parse("a/c").unwrap()[0]));
        assert!(!contains(&active, &parser.parse("a@other").unwrap()[0]));
    }
}
