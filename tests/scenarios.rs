//! End-to-end scenarios driving whole installed scripts through `Machine`,
//! assembled with the `ScriptBuilder`/`Body` helpers in `common`.

mod common;

use common::{run_to_finished, Body, ScriptBuilder};
use delftproto::host::NullPlatform;
use delftproto::opcodes::Opcode;
use delftproto::thread_table::ThreadId;
use delftproto::value::Value;
use delftproto::Machine;

fn fresh_machine() -> Machine<NullPlatform> {
    Machine::new(1, NullPlatform::default())
}

fn install(m: &mut Machine<NullPlatform>, sb: &ScriptBuilder) {
    m.install(sb.build());
    run_to_finished(m);
}

fn run_round(m: &mut Machine<NullPlatform>, now: f64) {
    m.run(now).unwrap();
    run_to_finished(m);
}

/// `main() = 2 + 3`. One thread, one `DEF_FUN`, activated at install time.
#[test]
fn arithmetic_addition_yields_five() {
    let mut sb = ScriptBuilder::new();
    sb.def_vm_ex([8, 8, 4, 1, 0, 0, 32]).activate(0);
    let body = Body::new().op(Opcode::LitN2).op(Opcode::LitN3).op(Opcode::Add).op(Opcode::Ret).build();
    sb.def_fun(&body).exit();

    let mut m = fresh_machine();
    install(&mut m, &sb);

    run_round(&mut m, 0.0);
    let result = m.threads().get(ThreadId(0)).unwrap().result.clone();
    assert_eq!(result.as_number(), Some(5.0));
}

/// `double(x) = x + x`; `main() = TUP_MAP(double, (1 2 3))`.
#[test]
fn tuple_map_doubles_every_element() {
    let mut sb = ScriptBuilder::new();
    sb.def_vm_ex([16, 16, 4, 1, 0, 0, 32]).activate(0);

    // global 0: double
    let double = Body::new().op(Opcode::RefN0).op(Opcode::RefN0).op(Opcode::Add).op(Opcode::Ret).build();
    sb.def_fun(&double);

    // global 1 (thread entry): main
    let main = Body::new()
        .op(Opcode::GloRefN0)
        .op(Opcode::LitN1)
        .op(Opcode::LitN2)
        .op(Opcode::LitN3)
        .op(Opcode::FabTup)
        .vlq(3)
        .op(Opcode::TupMap)
        .op(Opcode::Ret)
        .build();
    sb.def_fun(&main);
    sb.exit();

    let mut m = fresh_machine();
    install(&mut m, &sb);

    run_round(&mut m, 0.0);
    let result = m.threads().get(ThreadId(0)).unwrap().result.clone();
    let tuple = result.as_tuple().unwrap().borrow();
    let values: Vec<f32> = tuple.iter().map(|v| v.as_number().unwrap()).collect();
    assert_eq!(values, vec![2.0, 4.0, 6.0]);
}

/// `add(acc, x) = acc + x`; `main() = FOLD(add, 0, (10 20 30))`.
#[test]
fn fold_sums_a_tuple() {
    let mut sb = ScriptBuilder::new();
    sb.def_vm_ex([16, 16, 4, 1, 0, 0, 32]).activate(0);

    // global 0: add
    let add = Body::new().op(Opcode::RefN0).op(Opcode::RefN1).op(Opcode::Add).op(Opcode::Ret).build();
    sb.def_fun(&add);

    // global 1 (thread entry): main
    let main = Body::new()
        .op(Opcode::GloRefN0)
        .op(Opcode::LitN0)
        .op(Opcode::Lit)
        .vlq(10)
        .op(Opcode::Lit)
        .vlq(20)
        .op(Opcode::Lit)
        .vlq(30)
        .op(Opcode::FabTup)
        .vlq(3)
        .op(Opcode::Fold)
        .op(Opcode::Ret)
        .build();
    sb.def_fun(&main);
    sb.exit();

    let mut m = fresh_machine();
    install(&mut m, &sb);

    run_round(&mut m, 0.0);
    let result = m.threads().get(ThreadId(0)).unwrap().result.clone();
    assert_eq!(result.as_number(), Some(60.0));
}

/// A feedback counter: `INIT_FEEDBACK 0` (lambda returns `0`), `LIT_N1`,
/// `ADD`, `SET_FEEDBACK 0`. Five consecutive rounds should read `1..=5`.
#[test]
fn feedback_cell_counts_rounds() {
    let mut sb = ScriptBuilder::new();
    sb.def_vm_ex([16, 16, 4, 1, 1, 0, 32]).activate(0);

    // global 0: zero_init
    let zero_init = Body::new().op(Opcode::LitN0).op(Opcode::Ret).build();
    sb.def_fun(&zero_init);

    // global 1 (thread entry): main
    let main = Body::new()
        .op(Opcode::GloRefN0)
        .op(Opcode::InitFeedback)
        .vlq(0)
        .op(Opcode::LitN1)
        .op(Opcode::Add)
        .op(Opcode::SetFeedback)
        .vlq(0)
        .op(Opcode::Ret)
        .build();
    sb.def_fun(&main);
    sb.exit();

    let mut m = fresh_machine();
    install(&mut m, &sb);

    for (round, expected) in (0..5).zip(1..=5) {
        run_round(&mut m, round as f64);
        let result = m.threads().get(ThreadId(0)).unwrap().result.clone();
        assert_eq!(result.as_number(), Some(expected as f32), "round {round}");
    }
}

/// A feedback cell touched only every other round, via a body that branches
/// on its own previous result (`RESULT 0`). Round 1 initializes the cell,
/// round 2 skips it entirely (so it is garbage-collected back to
/// `Undefined`), and round 3 re-initializes it from scratch — exercising the
/// per-round state GC (spec.md §4.6, §8).
#[test]
fn untouched_feedback_cell_is_collected_and_reinitialized() {
    let mut sb = ScriptBuilder::new();
    sb.def_vm_ex([16, 16, 4, 1, 1, 0, 32]).activate(0);

    // global 0: zero_init
    let zero_init = Body::new().op(Opcode::LitN0).op(Opcode::Ret).build();
    sb.def_fun(&zero_init);

    // Touch block: push zero_init's address, init-or-read cell 0, add one,
    // write it back. Net stack effect: pushes the new (touched) value.
    let touch = Body::new()
        .op(Opcode::GloRefN0)
        .op(Opcode::InitFeedback)
        .vlq(0)
        .op(Opcode::LitN1)
        .op(Opcode::Add)
        .op(Opcode::SetFeedback)
        .vlq(0)
        .build();

    // Skip block: some other value that never touches cell 0.
    let skip = Body::new().op(Opcode::LitN0).build();

    let touch_len = touch.len();
    let skip_len = skip.len();
    let jmp_over_skip = Body::new().op(Opcode::Jmp).vlq(skip_len as u32).build();
    let if_skip_distance = touch_len + jmp_over_skip.len();

    // global 1 (thread entry): main
    let main = Body::new()
        .op(Opcode::Result)
        .vlq(0)
        .op(Opcode::If)
        .vlq(if_skip_distance as u32)
        .raw(&touch.build())
        .raw(&jmp_over_skip.build())
        .raw(&skip.build())
        .op(Opcode::Ret)
        .build();
    sb.def_fun(&main);
    sb.exit();

    let mut m = fresh_machine();
    install(&mut m, &sb);

    // Round 1: RESULT(0) is Undefined (falsy) -> touch block runs -> 0 + 1 = 1.
    run_round(&mut m, 0.0);
    assert_eq!(m.threads().get(ThreadId(0)).unwrap().result.as_number(), Some(1.0));

    // Round 2: RESULT(0) == 1 (truthy) -> skip block runs -> cell 0 untouched
    // this round, so the post-round GC resets it to Undefined.
    run_round(&mut m, 1.0);
    assert_eq!(m.threads().get(ThreadId(0)).unwrap().result.as_number(), Some(0.0));

    // Round 3: RESULT(0) == 0 (falsy) -> touch block runs again; since the
    // cell was collected, INIT_FEEDBACK re-initializes it from zero_init
    // rather than reading a stale value, giving 0 + 1 = 1 again (not 2).
    run_round(&mut m, 2.0);
    assert_eq!(m.threads().get(ThreadId(0)).unwrap().result.as_number(), Some(1.0));
}

/// `main() = MOD(0 - 7, 3)`. spec.md §8's quantified invariant: `MOD(a,b)`
/// lands in `[0, |b|)` even for a negative dividend.
#[test]
fn mod_on_negative_dividend_is_euclidean() {
    let mut sb = ScriptBuilder::new();
    sb.def_vm_ex([8, 8, 4, 1, 0, 0, 32]).activate(0);

    let main = Body::new()
        .op(Opcode::LitN0)
        .op(Opcode::Lit)
        .vlq(7)
        .op(Opcode::Sub)
        .op(Opcode::LitN3)
        .op(Opcode::Mod)
        .op(Opcode::Ret)
        .build();
    sb.def_fun(&main);
    sb.exit();

    let mut m = fresh_machine();
    install(&mut m, &sb);

    run_round(&mut m, 0.0);
    let result = m.threads().get(ThreadId(0)).unwrap().result.clone();
    assert_eq!(result.as_number(), Some(2.0));
}

/// `fuse(running, x) = running + x`; `main() = FOLD_HOOD(fuse, 0, 7)` on
/// channel 0. With no neighbors the result is `7` (self only); after a
/// neighbor imports `5` on that channel the result is `12`, with self fused
/// before the neighbor (spec.md §4.6's insertion-order contract).
#[test]
fn fold_hood_aggregates_neighbors_in_order() {
    let mut sb = ScriptBuilder::new();
    sb.def_vm_ex([16, 16, 4, 1, 0, 1, 32]).activate(0);

    // global 0: fuse
    let fuse = Body::new().op(Opcode::RefN0).op(Opcode::RefN1).op(Opcode::Add).op(Opcode::Ret).build();
    sb.def_fun(&fuse);

    // global 1 (thread entry): main
    let main = Body::new()
        .op(Opcode::GloRefN0)
        .op(Opcode::LitN0)
        .op(Opcode::LitN7)
        .op(Opcode::FoldHood)
        .vlq(0)
        .op(Opcode::Ret)
        .build();
    sb.def_fun(&main);
    sb.exit();

    let mut m = fresh_machine();
    install(&mut m, &sb);

    run_round(&mut m, 0.0);
    assert_eq!(m.threads().get(ThreadId(0)).unwrap().result.as_number(), Some(7.0));

    m.neighborhood_mut().upsert(2).imports[0] = Value::Number(5.0);

    run_round(&mut m, 1.0);
    assert_eq!(m.threads().get(ThreadId(0)).unwrap().result.as_number(), Some(12.0));
}
