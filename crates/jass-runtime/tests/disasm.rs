//! Disassembly snapshots

mod common;

use common::{compile, func, func_with};
use jass_runtime::ast::{ArithmeticSign, Expr, Stmt};
use jass_runtime::{disassemble, NativeId, NativeReturn, NativeTable, Type};

#[test]
fn test_call_and_local_listing() {
    let program = compile(
        &NativeTable::new(),
        vec![],
        vec![
            func_with(
                "double",
                &[("n", Type::Integer)],
                Type::Integer,
                vec![Stmt::Return(Some(Expr::binary(
                    ArithmeticSign::Multiply,
                    Expr::var("n"),
                    Expr::int(2),
                )))],
            ),
            func(
                "main",
                Type::Integer,
                vec![
                    Stmt::local("x", Type::Integer, Some(Expr::call("double", vec![Expr::int(21)]))),
                    Stmt::Return(Some(Expr::var("x"))),
                ],
            ),
        ],
    );

    insta::assert_snapshot!(disassemble(&program), @r"
    === Entry stubs ===
    0000  branch 0002  ; double
    0001  branch 0008  ; main

    === double (params 1, locals 1) ===
    0002  local-reference 0
    0003  push-literal 2
    0004  arithmetic *
    0005  return
    0006  push-literal nothing
    0007  return

    === main (params 0, locals 1) ===
    0008  new-stack-frame function 0
    0009  push-literal 21
    0010  set-return-addr 0012
    0011  branch 0000
    0012  local-assign 0
    0013  local-reference 0
    0014  return
    0015  push-literal nothing
    0016  return
    ");
}

#[test]
fn test_native_call_statement_listing() {
    let mut natives = NativeTable::new();
    natives
        .register_with_id("Print", NativeId(7), 1, |_| Ok(NativeReturn::nothing()))
        .unwrap();
    let program = compile(
        &natives,
        vec![],
        vec![func(
            "main",
            Type::Nothing,
            vec![Stmt::call("Print", vec![Expr::string("hi")])],
        )],
    );

    insta::assert_snapshot!(disassemble(&program), @r#"
    === Entry stubs ===
    0000  branch 0001  ; main

    === main (params 0, locals 0) ===
    0001  new-stack-frame native 7
    0002  push-literal "hi"
    0003  set-return-addr 0005
    0004  native 7 1
    0005  pop
    0006  push-literal nothing
    0007  return
    "#);
}
