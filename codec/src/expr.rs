//! Context expressions for lengths, counts and conditions.
//!
//! ```
//! use structbind_codec::{this, Context, Value};
//!
//! let mut ctx = Context::new();
//! ctx.insert("width", Value::Int(3));
//! ctx.insert("height", Value::Int(2));
//! let pixels = this("width") * this("height");
//! assert_eq!(pixels.eval(&ctx).unwrap(), 6);
//! ```

use crate::{Context, Error};
use std::{
    fmt,
    ops::{Add, Div, Mul, Sub},
    sync::Arc,
};

type ExprFn = Arc<dyn Fn(&Context<'_>) -> Result<i128, Error> + Send + Sync>;

/// An integer expression evaluated against a [Context].
#[derive(Clone)]
pub enum Expr {
    Const(i128),
    This(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Func(ExprFn),
}

/// References an already processed field (see [Context::resolve] for path syntax).
pub fn this(path: &str) -> Expr {
    Expr::This(path.to_string())
}

impl Expr {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<i128, Error> + Send + Sync + 'static,
    {
        Expr::Func(Arc::new(f))
    }

    pub fn eval(&self, ctx: &Context<'_>) -> Result<i128, Error> {
        let overflow = |v: i128| Error::ValueOutOfRange(v, "expression");
        match self {
            Expr::Const(v) => Ok(*v),
            Expr::This(path) => ctx.resolve(path)?.to_int(),
            Expr::Add(a, b) => {
                let a = a.eval(ctx)?;
                a.checked_add(b.eval(ctx)?).ok_or_else(|| overflow(a))
            }
            Expr::Sub(a, b) => {
                let a = a.eval(ctx)?;
                a.checked_sub(b.eval(ctx)?).ok_or_else(|| overflow(a))
            }
            Expr::Mul(a, b) => {
                let a = a.eval(ctx)?;
                a.checked_mul(b.eval(ctx)?).ok_or_else(|| overflow(a))
            }
            Expr::Div(a, b) => {
                let a = a.eval(ctx)?;
                let b = b.eval(ctx)?;
                if b == 0 {
                    return Err(Error::InvalidData(
                        "expression".to_string(),
                        "division by zero".to_string(),
                    ));
                }
                a.checked_div(b).ok_or_else(|| overflow(a))
            }
            Expr::Func(f) => f(ctx),
        }
    }

    /// Evaluates to a length or count, which must not be negative.
    pub fn eval_len(&self, ctx: &Context<'_>) -> Result<usize, Error> {
        let v = self.eval(ctx)?;
        usize::try_from(v).map_err(|_| Error::ValueOutOfRange(v, "length"))
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::This(path) => write!(f, "this.{path}"),
            Expr::Add(a, b) => write!(f, "({a:?} + {b:?})"),
            Expr::Sub(a, b) => write!(f, "({a:?} - {b:?})"),
            Expr::Mul(a, b) => write!(f, "({a:?} * {b:?})"),
            Expr::Div(a, b) => write!(f, "({a:?} / {b:?})"),
            Expr::Func(_) => write!(f, "<fn>"),
        }
    }
}

macro_rules! impl_from_int {
    ($($type:ty),*) => {
        $(
            impl From<$type> for Expr {
                fn from(v: $type) -> Self {
                    Expr::Const(v as i128)
                }
            }
        )*
    };
}

impl_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, i128);

macro_rules! impl_op {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::$variant(Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

impl_op!(Add, add, Add);
impl_op!(Sub, sub, Sub);
impl_op!(Mul, mul, Mul);
impl_op!(Div, div, Div);
