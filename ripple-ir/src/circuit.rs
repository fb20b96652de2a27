use crate::{Param, Port, Stmt};
use ripple_utils::{GetName, Id};
use std::collections::HashSet;

/// A module: internal with a body, or an external black box whose
/// definition lives in foreign Verilog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Module {
    Internal {
        name: Id,
        ports: Vec<Port>,
        body: Stmt,
    },
    External {
        name: Id,
        ports: Vec<Port>,
        defname: Id,
        params: Vec<Param>,
    },
}

impl Module {
    pub fn ports(&self) -> &[Port] {
        match self {
            Module::Internal { ports, .. } | Module::External { ports, .. } => {
                ports
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Module::Internal { .. })
    }

    /// Every name bound inside this module: ports, wires, nodes, registers,
    /// memories and their port labels, and instances. Used to seed fresh
    /// name generation.
    pub fn bound_names(&self) -> HashSet<Id> {
        let mut names: HashSet<Id> =
            self.ports().iter().map(|p| p.name).collect();
        if let Module::Internal { body, .. } = self {
            body.for_each(&mut |s| match s {
                Stmt::DefWire { name, .. }
                | Stmt::DefNode { name, .. }
                | Stmt::DefRegister { name, .. }
                | Stmt::DefInstance { name, .. }
                | Stmt::DefInstanceConnected { name, .. }
                | Stmt::DefInstanceConnector { name, .. } => {
                    names.insert(*name);
                }
                Stmt::DefMemory(mem) => {
                    names.insert(mem.name);
                    names.extend(mem.readers.iter().copied());
                    names.extend(mem.writers.iter().copied());
                    names.extend(mem.readwriters.iter().copied());
                }
                _ => {}
            });
        }
        names
    }
}

impl GetName for Module {
    fn name(&self) -> Id {
        match self {
            Module::Internal { name, .. } | Module::External { name, .. } => {
                *name
            }
        }
    }
}

/// An ordered sequence of modules with a designated top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    pub main: Id,
    pub modules: Vec<Module>,
}

impl Circuit {
    pub fn find_module(&self, name: Id) -> Option<&Module> {
        self.modules.iter().find(|m| m.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, Expr, RefKind, Type};

    #[test]
    fn bound_names_cover_ports_and_definitions() {
        let m = Module::Internal {
            name: "top".into(),
            ports: vec![Port::new("clk", Direction::Input, Type::Clock)],
            body: Stmt::Block(vec![
                Stmt::DefWire {
                    name: "w".into(),
                    ty: Type::uint(1),
                },
                Stmt::DefNode {
                    name: "n".into(),
                    value: Expr::reference("w", Type::uint(1), RefKind::Wire),
                },
            ]),
        };
        let names = m.bound_names();
        for n in ["clk", "w", "n"] {
            assert!(names.contains(&Id::from(n)), "missing {n}");
        }
    }
}
