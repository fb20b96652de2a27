use crate::traversal::{Named, Pass};
use ripple_ir::{Circuit, Expr, GetName, Module, Port, RefKind, Stmt, Type};
use ripple_utils::{Error, Id, NameGenerator, RippleResult};
use std::collections::HashMap;

#[derive(Default)]
/// Final normalization before emission:
///
/// 1. every primitive operand that is not a literal, reference, or
///    subfield is lifted into a fresh `_GEN` node immediately before the
///    consuming statement;
/// 2. every structural instance is converted to the connected form,
///    carrying one `(port subfield, bound expression)` pair per port of
///    the instantiated module.
pub struct Prep;

impl Named for Prep {
    fn name() -> &'static str {
        "prep"
    }

    fn description() -> &'static str {
        "lifts complex primitive operands and connects instance ports"
    }
}

impl Pass for Prep {
    fn run(&mut self, circuit: Circuit) -> RippleResult<Circuit> {
        let signatures: HashMap<Id, Vec<Port>> = circuit
            .modules
            .iter()
            .map(|m| (m.name(), m.ports().to_vec()))
            .collect();
        let modules = circuit
            .modules
            .into_iter()
            .map(|m| {
                let names = m.bound_names();
                match m {
                    Module::Internal { name, ports, body } => {
                        let mut ns =
                            NameGenerator::with_prev_defined_names(names);
                        Ok(Module::Internal {
                            name,
                            ports,
                            body: prep_stmt(body, &mut ns, &signatures)?,
                        })
                    }
                    ext => Ok(ext),
                }
            })
            .collect::<RippleResult<Vec<_>>>()?;
        Ok(Circuit {
            main: circuit.main,
            modules,
        })
    }
}

fn prep_stmt(
    stmt: Stmt,
    ns: &mut NameGenerator,
    signatures: &HashMap<Id, Vec<Port>>,
) -> RippleResult<Stmt> {
    match stmt {
        Stmt::Block(stmts) => Ok(Stmt::Block(
            stmts
                .into_iter()
                .map(|s| prep_stmt(s, ns, signatures))
                .collect::<RippleResult<Vec<_>>>()?,
        )),
        Stmt::DefInstance { name, module } => {
            let ports = signatures.get(&module).ok_or_else(|| {
                Error::malformed_ir(format!(
                    "instance `{name}` refers to undeclared module `{module}`"
                ))
            })?;
            let port_cons = ports
                .iter()
                .map(|p| {
                    let subfield = Expr::SubField {
                        expr: Box::new(Expr::reference(
                            name,
                            Type::uint(0),
                            RefKind::Instance,
                        )),
                        name: p.name,
                        ty: p.ty.clone(),
                    };
                    (subfield.clone(), subfield)
                })
                .collect();
            Ok(Stmt::DefInstanceConnected {
                name,
                module,
                port_cons,
            })
        }
        stmt => {
            let mut lifted = Vec::new();
            let stmt =
                stmt.map_exprs(&mut |e| lift_operands(e, ns, &mut lifted));
            if lifted.is_empty() {
                Ok(stmt)
            } else {
                lifted.push(stmt);
                Ok(Stmt::Block(lifted))
            }
        }
    }
}

fn lift_operands(
    expr: Expr,
    ns: &mut NameGenerator,
    lifted: &mut Vec<Stmt>,
) -> Expr {
    let expr = expr.map_children(&mut |e| lift_operands(e, ns, lifted));
    let Expr::DoPrim {
        op,
        args,
        consts,
        ty,
    } = expr
    else {
        return expr;
    };
    let args = args
        .into_iter()
        .map(|a| {
            if is_simple_operand(&a) {
                a
            } else {
                let name = ns.gen_name("_GEN");
                let node_ty = a.ty();
                lifted.push(Stmt::DefNode { name, value: a });
                Expr::reference(name, node_ty, RefKind::Node)
            }
        })
        .collect();
    Expr::DoPrim {
        op,
        args,
        consts,
        ty,
    }
}

fn is_simple_operand(e: &Expr) -> bool {
    matches!(
        e,
        Expr::UIntLit { .. }
            | Expr::SIntLit { .. }
            | Expr::Ref { .. }
            | Expr::SubField { .. }
    )
}
