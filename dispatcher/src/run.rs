use tracing::debug;

use crate::error::{Arity, DispatchError, Result};
use crate::registry::Dispatcher;
use crate::signature::MethodSignature;
use crate::value::Value;

impl Dispatcher {
    /// Call `method` on the object registered as `service`.
    ///
    /// `args` excludes the receiver. Arity and exact argument types are
    /// checked against the captured signature before the call; results come
    /// back in declaration order, untouched.
    pub fn run(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let (entry, found) = self.lookup(service, method)?;
        let signature = found.signature();

        verify_argument_count(signature, &args)?;
        verify_argument_types(signature, &args)?;

        debug!("Running {}.{} with {} arguments", service, method, args.len());

        let args = pack_variadic(signature, args);
        found.call(entry.instance.as_any(), args)
    }
}

/// Arguments are counted without the receiver; a variadic call needs at
/// least its fixed arguments, the trailing run may be empty.
fn verify_argument_count(signature: &MethodSignature, args: &[Value]) -> Result<()> {
    let fixed = signature.fixed_args().len();

    let expected = if signature.is_variadic() {
        Arity::AtLeast(fixed)
    } else {
        Arity::Exactly(fixed)
    };
    let accepted = match expected {
        Arity::AtLeast(n) => args.len() >= n,
        Arity::Exactly(n) => args.len() == n,
    };

    if accepted {
        Ok(())
    } else {
        Err(DispatchError::InvalidArgumentsCount {
            expected,
            found: args.len(),
        })
    }
}

fn verify_argument_types(signature: &MethodSignature, args: &[Value]) -> Result<()> {
    let fixed = signature.fixed_args();

    for (index, (declared, arg)) in fixed.iter().zip(args).enumerate() {
        if !declared.accepts(arg) {
            return Err(DispatchError::invalid_type(index + 1, declared, arg.kind()));
        }
    }

    let Some(elem) = signature.variadic_elem() else {
        return Ok(());
    };
    if elem.is_any() {
        return Ok(());
    }

    for (index, arg) in args.iter().enumerate().skip(fixed.len()) {
        if !elem.accepts(arg) {
            return Err(DispatchError::invalid_type(index + 1, elem, arg.kind()));
        }
    }

    Ok(())
}

/// Collect the trailing run of a variadic call into the single list the
/// method body receives.
fn pack_variadic(signature: &MethodSignature, mut args: Vec<Value>) -> Vec<Value> {
    if signature.is_variadic() {
        let rest = args.split_off(signature.fixed_args().len());
        args.push(Value::List(rest));
    }
    args
}
