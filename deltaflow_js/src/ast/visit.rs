//! Read-only walks over the AST used for hoisting and global discovery.

use crate::ast::{Expr, ExprKind, FunctionNode, Ident, Stmt, StmtKind};
use std::collections::BTreeSet;
use std::sync::Arc;

/// `var` declarations of `function`, including those nested in blocks, branches,
/// loops and try statements, but not those of nested functions.
pub fn var_declarations(function: &FunctionNode) -> Vec<&Ident> {
    let mut out = Vec::new();
    for stmt in &function.body {
        collect_vars(stmt, &mut out);
    }
    out
}

fn collect_vars<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Ident>) {
    match &stmt.kind {
        StmtKind::VarDecl(inits) => out.extend(inits.iter().map(|i| &i.name)),
        _ => nested(stmt, |s| collect_vars(s, out)),
    }
}

/// Function declarations (statements, not expressions) hoisted into `function`.
pub fn function_declarations(function: &FunctionNode) -> Vec<&Arc<FunctionNode>> {
    let mut out = Vec::new();
    for stmt in &function.body {
        collect_functions(stmt, &mut out);
    }
    out
}

fn collect_functions<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Arc<FunctionNode>>) {
    match &stmt.kind {
        StmtKind::FunctionDecl(f) => out.push(f),
        _ => nested(stmt, |s| collect_functions(s, out)),
    }
}

fn nested<'a>(stmt: &'a Stmt, mut f: impl FnMut(&'a Stmt)) {
    match &stmt.kind {
        StmtKind::Block(body) | StmtKind::Loop { body, .. } => body.iter().for_each(&mut f),
        StmtKind::If {
            consequent,
            alternate,
            ..
        } => consequent.iter().chain(alternate.iter()).for_each(&mut f),
        StmtKind::Try {
            block,
            handler,
            finalizer,
        } => block
            .iter()
            .chain(handler.iter())
            .chain(finalizer.iter())
            .for_each(&mut f),
        _ => {}
    }
}

/// Every function node reachable from `root`, `root` included.
pub fn functions(root: &Arc<FunctionNode>) -> Vec<Arc<FunctionNode>> {
    let mut names = NameCollector::default();
    names.function(root);
    names.functions
}

/// Names that are read or written somewhere under `root` but declared nowhere
/// (no `var`, parameter or function name binds them), in sorted order.
pub fn undeclared_names(root: &Arc<FunctionNode>) -> Vec<String> {
    let mut names = NameCollector::default();
    names.function(root);
    names
        .used
        .difference(&names.declared)
        .cloned()
        .collect()
}

#[derive(Default)]
struct NameCollector {
    used: BTreeSet<String>,
    declared: BTreeSet<String>,
    functions: Vec<Arc<FunctionNode>>,
}

impl NameCollector {
    fn function(&mut self, f: &Arc<FunctionNode>) {
        self.functions.push(f.clone());
        if let Some(name) = &f.name {
            self.declared.insert(name.name.clone());
        }
        for p in &f.params {
            self.declared.insert(p.name.clone());
        }
        for s in &f.body {
            self.stmt(s);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Empty | StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Expression(e) | StmtKind::Throw(e) => self.expr(e),
            StmtKind::VarDecl(inits) => {
                for init in inits {
                    self.declared.insert(init.name.name.clone());
                    if let Some(e) = &init.init {
                        self.expr(e);
                    }
                }
            }
            StmtKind::Return(e) => {
                if let Some(e) = e {
                    self.expr(e);
                }
            }
            StmtKind::FunctionDecl(f) => self.function(f),
            StmtKind::Block(body) => body.iter().for_each(|s| self.stmt(s)),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                consequent.iter().for_each(|s| self.stmt(s));
                alternate.iter().for_each(|s| self.stmt(s));
            }
            StmtKind::Loop { test, body } => {
                if let Some(t) = test {
                    self.expr(t);
                }
                body.iter().for_each(|s| self.stmt(s));
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                block.iter().for_each(|s| self.stmt(s));
                handler.iter().for_each(|s| self.stmt(s));
                finalizer.iter().for_each(|s| self.stmt(s));
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(n) => {
                self.used.insert(n.clone());
            }
            ExprKind::Number(_) | ExprKind::String(_) | ExprKind::Keyword(_) => {}
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Assign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            // The property name is a label, not a variable reference.
            ExprKind::PropertyGet { target, .. } => self.expr(target),
            ExprKind::ElementGet { target, element } => {
                self.expr(target);
                self.expr(element);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
            ExprKind::Object(props) => props.iter().for_each(|p| self.expr(&p.value)),
            ExprKind::Array(elems) => elems.iter().for_each(|e| self.expr(e)),
            ExprKind::Function(f) => self.function(f),
            ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
                self.expr(callee);
                args.iter().for_each(|a| self.expr(a));
            }
            ExprKind::Paren(inner) => self.expr(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::AstBuilder;

    #[test]
    fn hoists_nested_vars_but_not_inner_functions() {
        let mut b = AstBuilder::new();
        let inner_var = b.var("hidden", None);
        let inner = b.function(Some("inner"), &[], vec![inner_var]);
        let decl = b.func_decl(inner);
        let x = b.var("x", None);
        let t = b.name("t");
        let y = b.var("y", None);
        let branch = b.if_stmt(t, vec![y], vec![]);
        let script = b.script(vec![x, branch, decl]);

        let vars: Vec<_> = var_declarations(&script).iter().map(|i| i.name.as_str()).collect();
        assert_eq!(vars, vec!["x", "y"]);
        let funcs: Vec<_> = function_declarations(&script)
            .iter()
            .filter_map(|f| f.name())
            .collect();
        assert_eq!(funcs, vec!["inner"]);
    }

    #[test]
    fn undeclared_names_skip_declared_and_properties() {
        let mut b = AstBuilder::new();
        let window = b.name("window");
        let fetch = b.prop(window, "fetch");
        let arg = b.name("p");
        let call = b.call(fetch, vec![arg]);
        let body = b.expr_stmt(call);
        let f = b.function(Some("f"), &["p"], vec![body]);
        let decl = b.func_decl(f);
        let script = b.script(vec![decl]);
        assert_eq!(undeclared_names(&script), vec!["window".to_string()]);
        assert_eq!(functions(&script).len(), 2);
    }
}
