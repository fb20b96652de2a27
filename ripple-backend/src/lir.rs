//! IR passthrough backend: re-serializes a circuit at whatever normal form
//! it is currently in.
use crate::traits::Backend;
use crate::{Artifact, ArtifactKind, EmitRequest};
use itertools::Itertools;
use ripple_ir::{Circuit, GetName, Module, Printer, Stmt};
use ripple_utils::{Error, Id, OutputFile, RippleResult};

/// Re-emits the IR as text. Accepts any form the data model can hold.
#[derive(Default)]
pub struct LirBackend;

impl Backend for LirBackend {
    fn name(&self) -> &'static str {
        "lir"
    }

    fn validate(_circuit: &Circuit) -> RippleResult<()> {
        Ok(())
    }

    fn emit(circuit: &Circuit, file: &OutputFile) -> RippleResult<()> {
        Printer::write_circuit(circuit, &mut file.writer()?)?;
        Ok(())
    }

    fn artifacts(
        circuit: &Circuit,
        requests: &[EmitRequest],
    ) -> RippleResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for request in requests {
            match request {
                EmitRequest::Circuit => artifacts.push(Artifact {
                    name: circuit.main,
                    kind: ArtifactKind::LirCircuit,
                    text: Printer::circuit_string(circuit),
                }),
                EmitRequest::AllModules => {
                    for module in &circuit.modules {
                        if module.is_internal() {
                            artifacts.push(module_artifact(circuit, module)?);
                        }
                    }
                }
            }
        }
        Ok(artifacts)
    }
}

/// A self-contained circuit for one module: external stubs for everything
/// it directly instantiates, followed by the module itself, topped at the
/// module.
fn module_artifact(
    circuit: &Circuit,
    module: &Module,
) -> RippleResult<Artifact> {
    let Module::Internal { body, .. } = module else {
        return Err(Error::internal(
            "module artifacts are only produced for internal modules",
        ));
    };
    let mut modules = collect_instantiated(body)?
        .into_iter()
        .map(|name| {
            let target = circuit.find_module(name).ok_or_else(|| {
                Error::malformed_ir(format!(
                    "module `{}` instantiates undeclared module `{}`",
                    module.name(),
                    name
                ))
            })?;
            Ok(Module::External {
                name,
                ports: target.ports().to_vec(),
                defname: name,
                params: vec![],
            })
        })
        .collect::<RippleResult<Vec<_>>>()?;
    modules.push(module.clone());
    let standalone = Circuit {
        main: module.name(),
        modules,
    };
    Ok(Artifact {
        name: module.name(),
        kind: ArtifactKind::LirModule,
        text: Printer::circuit_string(&standalone),
    })
}

/// Modules directly instantiated by `body`, order-preserving and
/// deduplicated. The transient connector form must not appear here; a
/// previous pass should have removed it.
fn collect_instantiated(body: &Stmt) -> RippleResult<Vec<Id>> {
    let mut found = Vec::new();
    let mut connector = None;
    body.for_each(&mut |s| match s {
        Stmt::DefInstance { module, .. }
        | Stmt::DefInstanceConnected { module, .. } => found.push(*module),
        Stmt::DefInstanceConnector { name, .. } => {
            connector.get_or_insert(*name);
        }
        _ => {}
    });
    if let Some(name) = connector {
        return Err(Error::internal(format!(
            "instance connector `{}` survived into instance collection",
            name
        )));
    }
    Ok(found.into_iter().unique().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_ir::{Direction, Expr, Port, RefKind, Type};

    fn two_level_circuit() -> Circuit {
        let child = Module::Internal {
            name: "Child".into(),
            ports: vec![
                Port::new("in", Direction::Input, Type::uint(8)),
                Port::new("out", Direction::Output, Type::uint(8)),
            ],
            body: Stmt::Block(vec![Stmt::Connect {
                loc: Expr::reference("out", Type::uint(8), RefKind::Port),
                rhs: Expr::reference("in", Type::uint(8), RefKind::Port),
            }]),
        };
        let top = Module::Internal {
            name: "Top".into(),
            ports: vec![],
            body: Stmt::Block(vec![
                Stmt::DefInstance {
                    name: "a".into(),
                    module: "Child".into(),
                },
                Stmt::DefInstance {
                    name: "b".into(),
                    module: "Child".into(),
                },
            ]),
        };
        Circuit {
            main: "Top".into(),
            modules: vec![child, top],
        }
    }

    #[test]
    fn circuit_request_serializes_everything_once() {
        let circuit = two_level_circuit();
        let artifacts =
            LirBackend::artifacts(&circuit, &[EmitRequest::Circuit]).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "Top");
        assert_eq!(artifacts[0].kind, ArtifactKind::LirCircuit);
        assert!(artifacts[0].text.starts_with("circuit Top :\n"));
        assert!(artifacts[0].text.contains("  module Child :\n"));
    }

    #[test]
    fn module_request_stubs_out_instantiated_modules() {
        let circuit = two_level_circuit();
        let artifacts =
            LirBackend::artifacts(&circuit, &[EmitRequest::AllModules])
                .unwrap();
        assert_eq!(artifacts.len(), 2);

        // Leaf module: no stubs.
        assert_eq!(artifacts[0].name, "Child");
        assert!(artifacts[0].text.starts_with("circuit Child :\n"));
        assert!(!artifacts[0].text.contains("extmodule"));

        // Parent: the instantiated module is downgraded once, not twice.
        assert_eq!(artifacts[1].name, "Top");
        assert!(artifacts[1].text.starts_with("circuit Top :\n"));
        assert_eq!(artifacts[1].text.matches("extmodule Child :").count(), 1);
        assert!(artifacts[1].text.contains("    defname = Child\n"));
    }

    #[test]
    fn connector_forms_are_an_internal_error() {
        let circuit = Circuit {
            main: "Top".into(),
            modules: vec![Module::Internal {
                name: "Top".into(),
                ports: vec![],
                body: Stmt::DefInstanceConnector {
                    name: "c".into(),
                    module: "Child".into(),
                    exprs: vec![],
                },
            }],
        };
        let err = LirBackend::artifacts(&circuit, &[EmitRequest::AllModules])
            .unwrap_err();
        assert!(err.message().contains("Internal error"));
    }

    #[test]
    fn round_trips_are_stable() {
        let circuit = two_level_circuit();
        let a = Printer::circuit_string(&circuit);
        let b = Printer::circuit_string(&circuit);
        assert_eq!(a, b);
    }
}
