use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use mlua::LuaSerdeExt;
use serde_json::Value;

use cardsmith_ctml::{Axis, CardUnit, SizeContext};

use crate::script::runner::HostModuleFn;

/// State the `system` host module closes over: the root sizing context of
/// the card set plus its live variable table.
pub struct HostContext {
    pub context: SizeContext,
    pub variables: Arc<RwLock<HashMap<String, Value>>>,
}

fn unit_from_arg(value: &mlua::Value) -> mlua::Result<CardUnit> {
    match value {
        // Bare numbers are pixels.
        mlua::Value::Integer(n) => Ok(CardUnit::pixels(*n as f64)),
        mlua::Value::Number(n) => Ok(CardUnit::pixels(*n)),
        mlua::Value::String(s) => CardUnit::parse(&s.to_str()?).map_err(mlua::Error::external),
        other => Err(mlua::Error::RuntimeError(format!(
            "unit value must be a number or a unit string, got {}",
            other.type_name()
        ))),
    }
}

fn resolve(
    host: &HostContext,
    value: &mlua::Value,
    axis: Option<Axis>,
) -> mlua::Result<i32> {
    unit_from_arg(value)?
        .resolve_pixels(Some(&host.context), axis)
        .map_err(mlua::Error::external)
}

/// Builds the `system` module exposed to face scripts through `require`.
///
/// It gives scripts unit math anchored at the card's root dimensions and
/// read access to the card set variables, nothing else.
pub fn system_module(host: Arc<HostContext>) -> HostModuleFn {
    Arc::new(move |lua| {
        let table = lua.create_table()?;

        let ctx = Arc::clone(&host);
        table.set(
            "unit",
            lua.create_function(move |_, (value, is_width): (mlua::Value, Option<bool>)| {
                let axis = is_width.map(|w| if w { Axis::Width } else { Axis::Height });
                resolve(&ctx, &value, axis)
            })?,
        )?;

        let ctx = Arc::clone(&host);
        table.set(
            "left",
            lua.create_function(move |_, value: mlua::Value| {
                resolve(&ctx, &value, Some(Axis::Width))
            })?,
        )?;

        let ctx = Arc::clone(&host);
        table.set(
            "top",
            lua.create_function(move |_, value: mlua::Value| {
                resolve(&ctx, &value, Some(Axis::Height))
            })?,
        )?;

        let ctx = Arc::clone(&host);
        table.set(
            "right",
            lua.create_function(move |_, value: mlua::Value| {
                let offset = resolve(&ctx, &value, Some(Axis::Width))?;
                Ok(ctx.context.root_width() - offset)
            })?,
        )?;

        let ctx = Arc::clone(&host);
        table.set(
            "bottom",
            lua.create_function(move |_, value: mlua::Value| {
                let offset = resolve(&ctx, &value, Some(Axis::Height))?;
                Ok(ctx.context.root_height() - offset)
            })?,
        )?;

        let ctx = Arc::clone(&host);
        table.set(
            "get",
            lua.create_function(move |lua, name: String| {
                let variables = ctx
                    .variables
                    .read()
                    .map_err(|_| mlua::Error::RuntimeError("variable table poisoned".to_string()))?;
                match variables.get(&name) {
                    Some(value) => lua.to_value(value),
                    None => Ok(mlua::Value::Nil),
                }
            })?,
        )?;

        Ok(table)
    })
}
