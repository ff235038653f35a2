/*
*   Copyright (c) 2020 Adel Prokurov
*   All rights reserved.

*   Licensed under the Apache License, Version 2.0 (the "License");
*   you may not use this file except in compliance with the License.
*   You may obtain a copy of the License at

*   http://www.apache.org/licenses/LICENSE-2.0

*   Unless required by applicable law or agreed to in writing, software
*   distributed under the License is distributed on an "AS IS" BASIS,
*   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
*   See the License for the specific language governing permissions and
*   limitations under the License.
*/

use std::path::PathBuf;
use structopt::StructOpt;

use selfvm::ast::{Expr, Literal};
use selfvm::completion::Completion;
use selfvm::eval;
use selfvm::header::Reachability;
use selfvm::object::ObjectBody;
use selfvm::value::Value;
use selfvm::vm::VirtualMachine;

/// A real Self-syntax lexer/parser is out of scope (SPEC_FULL.md
/// "Non-goals"), so `FILE` is only used to confirm a program was named;
/// `--dump-ast` shows the fixed demo expression tree this binary actually
/// runs, which exercises lookup-through-parents, a primitive send, and an
/// assignment through a setter selector.
#[derive(Debug, StructOpt)]
#[structopt(name = "selfvm", about = "object runtime core")]
struct Opt {
    #[structopt(name = "FILE", parse(from_os_str))]
    input: PathBuf,

    #[structopt(long = "dump-ast", short = "A", help = "print the demo expression tree instead of running it")]
    dump_ast: bool,
}

fn demo_program() -> Expr {
    Expr::Sequence(vec![
        Expr::send(Expr::SelfRef, "greeting", vec![]),
        Expr::send(Expr::SelfRef, "greeting:", vec![Expr::Literal(Literal::Integer(7))]),
        Expr::send(Expr::SelfRef, "greeting", vec![]),
    ])
}

fn main() {
    let opt: Opt = Opt::from_args();
    simple_logger::init().unwrap();

    if !opt.input.exists() {
        log::warn!("{} does not exist; running the fixed demo program anyway", opt.input.display());
    }

    let program = demo_program();
    if opt.dump_ast {
        println!("{:#?}", program);
        return;
    }

    let mut vm = VirtualMachine::boot();
    install_greeting_slot(&mut vm);

    match eval::run_entrypoint(&mut vm, &program) {
        Completion::Normal(value) => {
            log::info!("program finished: {:?}", value);
            std::process::exit(0);
        }
        Completion::RuntimeError { message, .. } => {
            eprintln!("runtime error: {}", message);
            std::process::exit(1);
        }
        Completion::NonLocalReturn { .. } => unreachable!("run_entrypoint converts this to RuntimeError"),
    }
}

/// Wires a mutable `greeting` data slot onto the object trait (so the
/// demo's `greeting:` send has something to assign into and `greeting`
/// something to read back), using the same "extend the map, allocate a new
/// map object, patch the header" sequence the Map shape-transition
/// invariant describes (spec §4.3).
fn install_greeting_slot(vm: &mut VirtualMachine) {
    use selfvm::map::SlotKind;
    use selfvm::object::MapBody;

    let holder = vm.traits.object_proto;
    let object = vm.permanent.get(holder.index);
    let map_ptr = object.header.map.as_object_ptr().unwrap();
    let current_map = match &vm.permanent.get(map_ptr.index).body {
        ObjectBody::Map(m) => m.0.clone(),
        _ => panic!("object trait's map field is not a Map object"),
    };
    let extended = current_map.extended_with("greeting", SlotKind::DataMutable);
    let new_index = extended.find_slot(selfvm::selector::hash_name("greeting")).unwrap().index;
    let new_map_ptr = vm.permanent.allocate(ObjectBody::Map(MapBody(extended)), Value::from_object_ptr(map_ptr));

    let initial_greeting = vm
        .allocate(
            0,
            ObjectBody::ByteArray(selfvm::object::ByteArrayBody { bytes: b"hello, self".to_vec() }),
            Reachability::Local,
            Value::object_marker(),
        )
        .map(Value::from_object_ptr)
        .unwrap_or_else(|_| Value::from_object_ptr(vm.traits.nil));

    let nil = Value::from_object_ptr(vm.traits.nil);
    let object = vm.permanent.get_mut(holder.index);
    object.header.map = Value::from_object_ptr(new_map_ptr);
    if let ObjectBody::Slots(s) = &mut object.body {
        if s.slots.len() <= new_index {
            s.slots.resize(new_index + 1, nil);
        }
        s.slots[new_index] = initial_greeting;
    }
}
