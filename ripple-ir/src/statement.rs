use crate::{Expr, Type};
use ripple_utils::Id;

/// A memory definition together with its port lists.
///
/// The Verilog lowering requires `read_latency == 0`,
/// `write_latency == 1`, and an empty `readwriters` list; readwrite ports
/// are split upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    pub name: Id,
    pub data_type: Type,
    pub depth: u64,
    pub read_latency: u64,
    pub write_latency: u64,
    pub readers: Vec<Id>,
    pub writers: Vec<Id>,
    pub readwriters: Vec<Id>,
}

/// A statement in a module body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Connect {
        loc: Expr,
        rhs: Expr,
    },
    IsInvalid {
        expr: Expr,
    },
    DefNode {
        name: Id,
        value: Expr,
    },
    DefWire {
        name: Id,
        ty: Type,
    },
    DefRegister {
        name: Id,
        ty: Type,
        clock: Expr,
        reset: Expr,
        init: Expr,
    },
    DefMemory(Memory),
    /// Structural instance, as produced by a frontend.
    DefInstance {
        name: Id,
        module: Id,
    },
    /// Instance with one `(port subfield, bound expression)` pair per port
    /// of the instantiated module. Produced by the prep normalization; the
    /// only instance form the Verilog emitter accepts.
    DefInstanceConnected {
        name: Id,
        module: Id,
        port_cons: Vec<(Expr, Expr)>,
    },
    /// Transient connector form; must not survive into emission.
    DefInstanceConnector {
        name: Id,
        module: Id,
        exprs: Vec<Expr>,
    },
    /// Declares a group of analog nets as electrically connected.
    Attach(Vec<Expr>),
    Stop {
        clock: Expr,
        en: Expr,
        code: u64,
    },
    Print {
        clock: Expr,
        en: Expr,
        string: String,
        args: Vec<Expr>,
    },
    Skip,
}

impl Stmt {
    /// Rebuild a block with `f` applied to each child statement. Leaves
    /// every other statement untouched; callers drive the recursion.
    pub fn map_children<F: FnMut(Stmt) -> Stmt>(self, f: &mut F) -> Stmt {
        match self {
            Stmt::Block(stmts) => {
                Stmt::Block(stmts.into_iter().map(f).collect())
            }
            s => s,
        }
    }

    /// Rebuild this statement with `f` applied to every expression it holds
    /// directly.
    pub fn map_exprs<F: FnMut(Expr) -> Expr>(self, f: &mut F) -> Stmt {
        match self {
            Stmt::Connect { loc, rhs } => Stmt::Connect {
                loc: f(loc),
                rhs: f(rhs),
            },
            Stmt::IsInvalid { expr } => Stmt::IsInvalid { expr: f(expr) },
            Stmt::DefNode { name, value } => Stmt::DefNode {
                name,
                value: f(value),
            },
            Stmt::DefRegister {
                name,
                ty,
                clock,
                reset,
                init,
            } => Stmt::DefRegister {
                name,
                ty,
                clock: f(clock),
                reset: f(reset),
                init: f(init),
            },
            Stmt::DefInstanceConnected {
                name,
                module,
                port_cons,
            } => Stmt::DefInstanceConnected {
                name,
                module,
                port_cons: port_cons
                    .into_iter()
                    .map(|(p, e)| (f(p), f(e)))
                    .collect(),
            },
            Stmt::DefInstanceConnector {
                name,
                module,
                exprs,
            } => Stmt::DefInstanceConnector {
                name,
                module,
                exprs: exprs.into_iter().map(f).collect(),
            },
            Stmt::Attach(exprs) => {
                Stmt::Attach(exprs.into_iter().map(f).collect())
            }
            Stmt::Stop { clock, en, code } => Stmt::Stop {
                clock: f(clock),
                en: f(en),
                code,
            },
            Stmt::Print {
                clock,
                en,
                string,
                args,
            } => Stmt::Print {
                clock: f(clock),
                en: f(en),
                string,
                args: args.into_iter().map(f).collect(),
            },
            s @ (Stmt::Block(_)
            | Stmt::DefWire { .. }
            | Stmt::DefMemory(_)
            | Stmt::DefInstance { .. }
            | Stmt::Skip) => s,
        }
    }

    /// Pre-order walk over this statement and everything below it.
    pub fn for_each<F: FnMut(&Stmt)>(&self, f: &mut F) {
        f(self);
        if let Stmt::Block(stmts) = self {
            for s in stmts {
                s.for_each(f);
            }
        }
    }
}
