use crate::ast::{
    AssignOp, BinaryOp, ChangeType, Expr, ExprKind, FunctionNode, Ident, Keyword, NodeId,
    ObjectProperty, Stmt, StmtKind, UnaryOp, VarInit,
};
use std::sync::Arc;

/// Hands out fresh node ids while constructing ASTs programmatically.
///
/// Every constructor produces an unchanged node; use [Expr::with_change] or
/// [Stmt::with_change] to classify nodes afterwards.
#[derive(Debug, Clone)]
pub struct AstBuilder {
    next: i32,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Start numbering at `first`. Useful when two versions of a program must not share ids.
    pub fn starting_at(first: i32) -> Self {
        Self { next: first }
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.fresh(),
            change: ChangeType::Unchanged,
            kind,
        }
    }

    fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.fresh(),
            change: ChangeType::Unchanged,
            kind,
        }
    }

    pub fn ident(&mut self, name: &str) -> Ident {
        Ident {
            id: self.fresh(),
            change: ChangeType::Unchanged,
            name: name.to_string(),
        }
    }

    pub fn name(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Name(name.to_string()))
    }

    pub fn num(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::Number(value))
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.expr(ExprKind::String(value.to_string()))
    }

    pub fn keyword(&mut self, keyword: Keyword) -> Expr {
        self.expr(ExprKind::Keyword(keyword))
    }

    pub fn this(&mut self) -> Expr {
        self.keyword(Keyword::This)
    }

    pub fn null(&mut self) -> Expr {
        self.keyword(Keyword::Null)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn assign(&mut self, target: Expr, value: Expr) -> Expr {
        self.assign_op(AssignOp::Assign, target, value)
    }

    pub fn assign_op(&mut self, op: AssignOp, target: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn prop(&mut self, target: Expr, property: &str) -> Expr {
        let property = self.name(property);
        self.expr(ExprKind::PropertyGet {
            target: Box::new(target),
            property: Box::new(property),
        })
    }

    pub fn elem(&mut self, target: Expr, element: Expr) -> Expr {
        self.expr(ExprKind::ElementGet {
            target: Box::new(target),
            element: Box::new(element),
        })
    }

    pub fn cond(&mut self, test: Expr, consequent: Expr, alternate: Expr) -> Expr {
        self.expr(ExprKind::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    pub fn object(&mut self, props: Vec<(&str, Expr)>) -> Expr {
        let props = props
            .into_iter()
            .map(|(key, value)| ObjectProperty {
                id: self.fresh(),
                change: ChangeType::Unchanged,
                key: key.to_string(),
                value,
            })
            .collect();
        self.expr(ExprKind::Object(props))
    }

    pub fn array(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Array(elems))
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn new_call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::New {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn paren(&mut self, inner: Expr) -> Expr {
        self.expr(ExprKind::Paren(Box::new(inner)))
    }

    pub fn function(&mut self, name: Option<&str>, params: &[&str], body: Vec<Stmt>) -> Arc<FunctionNode> {
        let id = self.fresh();
        let name = name.map(|n| self.ident(n));
        let params = params.iter().map(|p| self.ident(p)).collect();
        Arc::new(FunctionNode {
            id,
            change: ChangeType::Unchanged,
            name,
            params,
            body,
        })
    }

    pub fn function_expr(&mut self, func: Arc<FunctionNode>) -> Expr {
        self.expr(ExprKind::Function(func))
    }

    pub fn script(&mut self, body: Vec<Stmt>) -> Arc<FunctionNode> {
        self.function(None, &[], body)
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expression(expr))
    }

    pub fn var(&mut self, name: &str, init: Option<Expr>) -> Stmt {
        let name = self.ident(name);
        self.stmt(StmtKind::VarDecl(vec![VarInit { name, init }]))
    }

    pub fn ret(&mut self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(value))
    }

    pub fn throw(&mut self, value: Expr) -> Stmt {
        self.stmt(StmtKind::Throw(value))
    }

    pub fn func_decl(&mut self, func: Arc<FunctionNode>) -> Stmt {
        self.stmt(StmtKind::FunctionDecl(func))
    }

    pub fn empty(&mut self) -> Stmt {
        self.stmt(StmtKind::Empty)
    }

    pub fn block(&mut self, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(body))
    }

    pub fn if_stmt(&mut self, test: Expr, consequent: Vec<Stmt>, alternate: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            test,
            consequent,
            alternate,
        })
    }

    pub fn loop_stmt(&mut self, test: Option<Expr>, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Loop { test, body })
    }
}

impl Expr {
    pub fn with_change(mut self, change: ChangeType) -> Self {
        self.change = change;
        self
    }

    /// Classify this node and every node below it.
    pub fn with_change_deep(mut self, change: ChangeType) -> Self {
        self.change = change;
        self.kind = match self.kind {
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(operand.with_change_deep(change)),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op,
                left: Box::new(left.with_change_deep(change)),
                right: Box::new(right.with_change_deep(change)),
            },
            ExprKind::Assign { op, target, value } => ExprKind::Assign {
                op,
                target: Box::new(target.with_change_deep(change)),
                value: Box::new(value.with_change_deep(change)),
            },
            ExprKind::PropertyGet { target, property } => ExprKind::PropertyGet {
                target: Box::new(target.with_change_deep(change)),
                property: Box::new(property.with_change_deep(change)),
            },
            ExprKind::ElementGet { target, element } => ExprKind::ElementGet {
                target: Box::new(target.with_change_deep(change)),
                element: Box::new(element.with_change_deep(change)),
            },
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: Box::new(callee.with_change_deep(change)),
                args: args.into_iter().map(|a| a.with_change_deep(change)).collect(),
            },
            ExprKind::Paren(inner) => ExprKind::Paren(Box::new(inner.with_change_deep(change))),
            other => other,
        };
        self
    }
}

impl Stmt {
    pub fn with_change(mut self, change: ChangeType) -> Self {
        self.change = change;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut b = AstBuilder::new();
        let x = b.name("x");
        let one = b.num(1.0);
        let assign = b.assign(x.clone(), one.clone());
        assert!(x.id < one.id);
        assert!(one.id < assign.id);
    }

    #[test]
    fn deep_change_marks_children() {
        let mut b = AstBuilder::new();
        let x = b.name("x");
        let y = b.name("y");
        let sum = b.binary(BinaryOp::Add, x, y).with_change_deep(ChangeType::Updated);
        match &sum.kind {
            ExprKind::Binary { left, right, .. } => {
                assert_eq!(left.change, ChangeType::Updated);
                assert_eq!(right.change, ChangeType::Updated);
            }
            _ => panic!("expected binary"),
        }
    }
}
