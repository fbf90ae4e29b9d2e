//! # Instruction Parser
//!
//! Text ⇄ instruction tree.
//!
//! ```text
//! a(1)@main!/(b+c)+d
//! │ │  │   │  └── children of `a`, grouped
//! │ │  │   └───── `a` does not own a scope
//! │ │  └───────── endpoint name
//! │ └──────────── parameters
//! └────────────── component
//! ```
//!
//! `stringify` is the exact inverse of `parse`; `stringify_with` additionally
//! lets an [`InstructionDescriber`] drop components and endpoint names that
//! the current endpoint tree implies.
//!
//! The add and clear tokens are configurable. Parsed instructions always
//! carry [`ADD_COMPONENT`] and [`CLEAR_COMPONENT`], whatever the text used.

use crate::domain::instruction::{
    InstructionEndpoint, InstructionParameters, RoutingInstruction, ADD_COMPONENT,
    CLEAR_COMPONENT,
};
use crate::error::{RouterError, RouterResult};
use serde::{Deserialize, Serialize};

/// The token vocabulary of the instruction grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Separators {
    pub viewport: String,
    pub sibling: String,
    pub scope: String,
    pub scope_start: String,
    pub scope_end: String,
    pub no_scope: String,
    pub parameters_start: String,
    pub parameters_end: String,
    pub parameter_separator: String,
    pub parameter_key_separator: String,
    pub parent_scope: String,
    pub add: String,
    pub clear: String,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            viewport: "@".into(),
            sibling: "+".into(),
            scope: "/".into(),
            scope_start: "(".into(),
            scope_end: ")".into(),
            no_scope: "!".into(),
            parameters_start: "(".into(),
            parameters_end: ")".into(),
            parameter_separator: ",".into(),
            parameter_key_separator: "=".into(),
            parent_scope: "..".into(),
            add: ADD_COMPONENT.into(),
            clear: CLEAR_COMPONENT.into(),
        }
    }
}

/// Decides which parts of an instruction are implied by the endpoint tree.
pub trait InstructionDescriber {
    /// Leave the whole instruction out.
    fn exclude(&self, _instruction: &RoutingInstruction) -> bool {
        false
    }

    /// The component is the endpoint's default and can be left out.
    fn suppress_component(&self, _instruction: &RoutingInstruction) -> bool {
        false
    }

    /// The endpoint name is not needed to find the endpoint again.
    fn suppress_endpoint(&self, _instruction: &RoutingInstruction) -> bool {
        false
    }
}

/// Describes everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullDescriber;

impl InstructionDescriber for FullDescriber {}

/// Parser and stringifier for routing instructions.
#[derive(Debug, Clone, Default)]
pub struct InstructionParser {
    separators: Separators,
}

impl InstructionParser {
    pub fn new(separators: Separators) -> Self {
        Self { separators }
    }

    pub fn separators(&self) -> &Separators {
        &self.separators
    }

    /// Whether `input` is the reserved add token, alone or with an endpoint.
    pub fn is_add(&self, input: &str) -> bool {
        let seps = &self.separators;
        match input.strip_prefix(seps.add.as_str()) {
            Some(rest) => {
                rest.is_empty() || rest.starts_with(&seps.viewport) || rest.starts_with(&seps.sibling)
            }
            None => false,
        }
    }

    /// Parse instruction text into a forest of instructions.
    pub fn parse(&self, input: &str) -> RouterResult<Vec<RoutingInstruction>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        if input.starts_with(&self.separators.sibling) && !self.is_add(input) {
            return Err(parse_error(
                input,
                0,
                "instructions cannot start with a sibling separator",
            ));
        }

        let mut cursor = Cursor {
            input,
            pos: 0,
            seps: &self.separators,
        };
        let instructions = cursor.list(false)?;
        if !cursor.done() {
            return Err(cursor.error("unexpected input"));
        }
        Ok(instructions)
    }

    /// Exact inverse of [`parse`](Self::parse).
    pub fn stringify(&self, instructions: &[RoutingInstruction]) -> String {
        self.stringify_with(instructions, &FullDescriber, true)
    }

    /// Stringify, letting `describer` drop implied parts unless `full_state`.
    pub fn stringify_with(
        &self,
        instructions: &[RoutingInstruction],
        describer: &dyn InstructionDescriber,
        full_state: bool,
    ) -> String {
        instructions
            .iter()
            .map(|instruction| self.stringify_one(instruction, describer, full_state))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(&self.separators.sibling)
    }

    fn stringify_one(
        &self,
        instruction: &RoutingInstruction,
        describer: &dyn InstructionDescriber,
        full_state: bool,
    ) -> String {
        let seps = &self.separators;
        if !full_state && describer.exclude(instruction) {
            return String::new();
        }

        let children: Vec<String> = instruction
            .children()
            .iter()
            .map(|child| self.stringify_one(child, describer, full_state))
            .filter(|text| !text.is_empty())
            .collect();

        if !full_state && children.is_empty() && describer.suppress_component(instruction) {
            return String::new();
        }

        let mut text = instruction.scope_modifier.clone();
        text.push_str(if instruction.is_add() {
            seps.add.as_str()
        } else if instruction.is_clear() {
            seps.clear.as_str()
        } else {
            instruction.component_name()
        });

        if !instruction.parameters.is_empty() {
            text.push_str(&seps.parameters_start);
            text.push_str(&instruction.parameters.to_text());
            text.push_str(&seps.parameters_end);
        }

        if let Some(name) = instruction.endpoint_name() {
            if full_state || !describer.suppress_endpoint(instruction) {
                text.push_str(&seps.viewport);
                text.push_str(name);
            }
        }

        if !instruction.owns_scope {
            text.push_str(&seps.no_scope);
        }

        match children.len() {
            0 => {}
            1 => {
                text.push_str(&seps.scope);
                text.push_str(&children[0]);
            }
            _ => {
                text.push_str(&seps.scope);
                text.push_str(&seps.scope_start);
                text.push_str(&children.join(&seps.sibling));
                text.push_str(&seps.scope_end);
            }
        }
        text
    }
}

fn parse_error(input: &str, position: usize, reason: &str) -> RouterError {
    RouterError::Parse {
        input: input.to_string(),
        position,
        reason: reason.to_string(),
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    seps: &'a Separators,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        let input = self.input;
        &input[self.pos..]
    }

    fn done(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn at(&self, token: &str) -> bool {
        !token.is_empty() && self.rest().starts_with(token)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.at(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn error(&self, reason: &str) -> RouterError {
        parse_error(self.input, self.pos, reason)
    }

    fn at_stop(&self) -> bool {
        let s = self.seps;
        [
            &s.viewport,
            &s.sibling,
            &s.scope,
            &s.scope_start,
            &s.scope_end,
            &s.no_scope,
            &s.parameters_start,
        ]
        .iter()
        .any(|token| self.at(token))
    }

    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while !self.done() && !self.at_stop() {
            let width = self.rest().chars().next().map_or(1, char::len_utf8);
            self.pos += width;
        }
        let input = self.input;
        &input[start..self.pos]
    }

    /// Siblings until input end, or a close marker when `grouped`.
    fn list(&mut self, grouped: bool) -> RouterResult<Vec<RoutingInstruction>> {
        let seps = self.seps;
        let mut instructions = Vec::new();
        loop {
            if self.done() {
                // An unterminated group ends at input exhaustion.
                break;
            }
            if self.at(&seps.scope_end) {
                if grouped {
                    break;
                }
                return Err(self.error("unbalanced close marker"));
            }

            if self.eat(&seps.scope_start) {
                instructions.extend(self.list(true)?);
                self.eat(&seps.scope_end);
            } else {
                instructions.push(self.segment()?);
            }

            if self.done() || self.at(&seps.scope_end) {
                continue;
            }
            if !self.eat(&seps.sibling) {
                return Err(self.error("expected a sibling separator"));
            }
            if self.done() || self.at(&seps.scope_end) {
                return Err(self.error("missing component name"));
            }
        }
        Ok(instructions)
    }

    fn scope_modifier(&mut self) -> String {
        let seps = self.seps;
        let parent = format!("{}{}", seps.parent_scope, seps.scope);
        let mut modifier = String::new();
        while self.eat(&parent) {
            modifier.push_str(&parent);
        }
        if modifier.is_empty() && self.eat(&seps.scope) {
            modifier.push_str(&seps.scope);
        }
        modifier
    }

    fn segment(&mut self) -> RouterResult<RoutingInstruction> {
        let seps = self.seps;
        let modifier = self.scope_modifier();

        let add_follows = {
            let after = self.rest().get(seps.add.len()..).unwrap_or_default();
            after.is_empty()
                || after.starts_with(&seps.viewport)
                || after.starts_with(&seps.sibling)
                || after.starts_with(&seps.scope_end)
        };
        let component = if self.at(&seps.add) && add_follows {
            self.pos += seps.add.len();
            ADD_COMPONENT
        } else {
            match self.name() {
                name if name == seps.clear => CLEAR_COMPONENT,
                name => name,
            }
        };
        if component.is_empty() {
            return Err(self.error("missing component name"));
        }

        let mut instruction = RoutingInstruction::new(component).with_scope_modifier(modifier);

        if self.eat(&seps.parameters_start) {
            let Some(length) = self.rest().find(seps.parameters_end.as_str()) else {
                return Err(self.error("unterminated parameter list"));
            };
            let text = &self.rest()[..length];
            if !text.is_empty() {
                instruction.parameters = InstructionParameters::Text(text.to_string());
            }
            self.pos += length + seps.parameters_end.len();

            let valid_follow = self.done()
                || [&seps.viewport, &seps.no_scope, &seps.scope, &seps.sibling, &seps.scope_end]
                    .iter()
                    .any(|token| self.at(token));
            if !valid_follow {
                return Err(self.error("unexpected text after parameters"));
            }
        }

        if self.eat(&seps.viewport) {
            let name = self.name();
            if name.is_empty() {
                return Err(self.error("missing endpoint name"));
            }
            instruction.endpoint = InstructionEndpoint::Name(name.to_string());
        }

        if self.eat(&seps.no_scope) {
            instruction.owns_scope = false;
        }

        if self.eat(&seps.scope) {
            if self.eat(&seps.scope_start) {
                let children = self.list(true)?;
                self.eat(&seps.scope_end);
                instruction.next_scope_instructions = Some(children);
            } else if !self.done() && !self.at(&seps.sibling) && !self.at(&seps.scope_end)
            {
                instruction.next_scope_instructions = Some(vec![self.segment()?]);
            }
        }

        Ok(instruction)
    }
}
