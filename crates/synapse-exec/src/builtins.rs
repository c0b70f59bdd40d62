//! Built-in instructions.
//!
//! | name        | kind       | behavior                                             |
//! |-------------|------------|------------------------------------------------------|
//! | `exit`      | terminator | halts the processor                                  |
//! | `break`     | statement  | skips the innermost loop to its end                  |
//! | `print`     | statement  | appends the rendered arguments to the output         |
//! | `add`       | result     | sum of the arguments (int if all are ints)           |
//! | `count`     | result     | number of evaluated arguments                        |
//! | `not`       | result     | True unless the arguments are all True               |
//! | `children`  | result     | children of each cluster argument                    |
//! | `add-child` | statement  | appends arguments 2.. to the cluster in argument 1   |
//! | `link`      | statement  | links argument 1 to argument 2 with meaning 3        |

use synapse_core::{LockRequestList, NeuronGraph, NeuronId, Scalar, Value};

use crate::context::ExecContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::RuntimeError;
use crate::fast_path::Capabilities;
use crate::instruction::{
    BoolInstruction, DoubleInstruction, Flow, Instruction, InstructionSet, IntInstruction,
};

pub(crate) fn register_all(set: &mut InstructionSet, graph: &NeuronGraph) {
    set.register(graph, Exit);
    set.register(graph, Break);
    set.register(graph, Print);
    set.register(graph, Add);
    set.register(graph, Count);
    set.register(graph, Not);
    set.register(graph, Children);
    set.register(graph, AddChild);
    set.register(graph, Link);
}

pub struct Exit;

impl Instruction for Exit {
    fn name(&self) -> &str {
        "exit"
    }

    fn is_terminator(&self) -> bool {
        true
    }
}

pub struct Break;

impl Instruction for Break {
    fn name(&self) -> &str {
        "break"
    }

    fn execute(&self, _ctx: &mut ExecContext<'_>, _args: &[Value]) -> Result<Flow, RuntimeError> {
        Ok(Flow::Break)
    }
}

pub struct Print;

impl Instruction for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Flow, RuntimeError> {
        let graph = ctx.graph();
        let line = args
            .iter()
            .map(|v| v.render(graph))
            .collect::<Vec<_>>()
            .join(" ");
        ctx.emit(line);
        Ok(Flow::Next)
    }
}

pub struct Add;

impl Instruction for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn get_values(
        &self,
        ctx: &mut ExecContext<'_>,
        args: &[Value],
        out: &mut Vec<Value>,
    ) -> Result<(), RuntimeError> {
        let graph = ctx.graph();
        let mut int_sum: i64 = 0;
        let mut double_sum = 0.0;
        let mut all_ints = true;
        for arg in args {
            match arg.scalar(graph) {
                Some(Scalar::Int(v)) => {
                    int_sum = int_sum.wrapping_add(v);
                    double_sum += v as f64;
                }
                Some(Scalar::Double(v)) => {
                    all_ints = false;
                    double_sum += v;
                }
                _ => ctx.report(
                    DiagnosticKind::Type,
                    "add",
                    ctx.current(),
                    format!("{arg} is not a number"),
                ),
            }
        }
        out.push(if all_ints {
            Value::Int(int_sum)
        } else {
            Value::Double(double_sum)
        });
        Ok(())
    }

    fn as_int(&self) -> Option<&dyn IntInstruction> {
        Some(self)
    }

    fn as_double(&self) -> Option<&dyn DoubleInstruction> {
        Some(self)
    }
}

impl IntInstruction for Add {
    fn can_get_int(&self, args: &[Capabilities]) -> bool {
        args.iter().all(|c| c.int)
    }

    fn get_int(&self, ctx: &mut ExecContext<'_>, args: &[NeuronId]) -> Result<i64, RuntimeError> {
        let mut sum: i64 = 0;
        for &arg in args {
            sum = sum.wrapping_add(ctx.get_int(arg)?);
        }
        Ok(sum)
    }
}

impl DoubleInstruction for Add {
    fn can_get_double(&self, args: &[Capabilities]) -> bool {
        args.iter().all(|c| c.double)
    }

    fn get_double(&self, ctx: &mut ExecContext<'_>, args: &[NeuronId]) -> Result<f64, RuntimeError> {
        let mut sum = 0.0;
        for &arg in args {
            sum += ctx.get_double(arg)?;
        }
        Ok(sum)
    }
}

pub struct Count;

impl Instruction for Count {
    fn name(&self) -> &str {
        "count"
    }

    fn get_values(
        &self,
        _ctx: &mut ExecContext<'_>,
        args: &[Value],
        out: &mut Vec<Value>,
    ) -> Result<(), RuntimeError> {
        out.push(Value::Int(args.len() as i64));
        Ok(())
    }

    fn as_int(&self) -> Option<&dyn IntInstruction> {
        Some(self)
    }
}

impl IntInstruction for Count {
    fn get_int(&self, ctx: &mut ExecContext<'_>, args: &[NeuronId]) -> Result<i64, RuntimeError> {
        Ok(ctx.resolve_arguments(args)?.len() as i64)
    }
}

pub struct Not;

fn all_true(values: &[Value]) -> bool {
    !values.is_empty() && values.iter().all(Value::is_true)
}

impl Instruction for Not {
    fn name(&self) -> &str {
        "not"
    }

    fn get_values(
        &self,
        _ctx: &mut ExecContext<'_>,
        args: &[Value],
        out: &mut Vec<Value>,
    ) -> Result<(), RuntimeError> {
        out.push(Value::truth(!all_true(args)));
        Ok(())
    }

    fn as_bool(&self) -> Option<&dyn BoolInstruction> {
        Some(self)
    }
}

impl BoolInstruction for Not {
    fn get_bool(&self, ctx: &mut ExecContext<'_>, args: &[NeuronId]) -> Result<bool, RuntimeError> {
        if let [single] = args {
            return Ok(!ctx.test_condition(*single)?);
        }
        Ok(!all_true(&ctx.resolve_arguments(args)?))
    }
}

pub struct Children;

impl Instruction for Children {
    fn name(&self) -> &str {
        "children"
    }

    fn get_values(
        &self,
        ctx: &mut ExecContext<'_>,
        args: &[Value],
        out: &mut Vec<Value>,
    ) -> Result<(), RuntimeError> {
        for arg in args {
            let children = arg
                .neuron()
                .and_then(|id| ctx.graph().get(id))
                .and_then(|n| n.children());
            match children {
                Some(children) => out.extend(children.into_iter().map(Value::Neuron)),
                None => ctx.report(
                    DiagnosticKind::Type,
                    "children",
                    ctx.current(),
                    format!("{arg} is not a cluster"),
                ),
            }
        }
        Ok(())
    }
}

pub struct AddChild;

impl Instruction for AddChild {
    fn name(&self) -> &str {
        "add-child"
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Flow, RuntimeError> {
        let Some((Value::Neuron(cluster), children)) = args.split_first() else {
            ctx.report(
                DiagnosticKind::Structural,
                "add-child",
                ctx.current(),
                "first argument must be a cluster",
            );
            return Ok(Flow::Next);
        };
        let mut list = LockRequestList::new();
        list.lock_neuron(*cluster);
        let _held = ctx.lock(&list)?;
        for child in children {
            let added = match child.neuron() {
                Some(child) => ctx.graph().add_child(*cluster, child).is_ok(),
                None => false,
            };
            if !added {
                ctx.report(
                    DiagnosticKind::Type,
                    "add-child",
                    *cluster,
                    format!("cannot add {child}"),
                );
            }
        }
        Ok(Flow::Next)
    }
}

pub struct Link;

impl Instruction for Link {
    fn name(&self) -> &str {
        "link"
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Flow, RuntimeError> {
        let ids: Vec<NeuronId> = args.iter().filter_map(Value::neuron).collect();
        let [from, to, meaning] = ids.as_slice() else {
            ctx.report(
                DiagnosticKind::Structural,
                "link",
                ctx.current(),
                "expected (from, to, meaning) neurons",
            );
            return Ok(Flow::Next);
        };
        let mut list = LockRequestList::new();
        list.lock_link_endpoint(0, *from);
        list.lock_link_endpoint(1, *to);
        let _held = ctx.lock(&list)?;
        if let Err(error) = ctx.graph().add_link(*from, *to, *meaning) {
            ctx.report(DiagnosticKind::Structural, "link", *from, error.to_string());
        }
        Ok(Flow::Next)
    }
}
