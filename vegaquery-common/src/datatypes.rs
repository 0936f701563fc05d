use crate::error::{Result, ResultWithContext};
use arrow::datatypes::DataType;
use datafusion_common::DFSchema;
use datafusion_expr::{lit, try_cast, Expr, ExprSchemable};

pub fn is_numeric_datatype(dtype: &DataType) -> bool {
    is_integer_datatype(dtype)
        || is_float_datatype(dtype)
        || matches!(
            dtype,
            DataType::Decimal128(_, _) | DataType::Decimal256(_, _)
        )
}

pub fn is_integer_datatype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub fn is_float_datatype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float16 | DataType::Float32 | DataType::Float64
    )
}

pub fn is_string_datatype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

pub fn is_temporal_datatype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64
    )
}

/// get datatype for expression
pub fn data_type(value: &Expr, schema: &DFSchema) -> Result<DataType> {
    value.get_type(schema).with_context(|| {
        format!("Failed to infer datatype of expression: {value}\nschema: {schema:?}")
    })
}

/// Boolean view of an expression, where null counts as false
pub fn to_boolean(value: Expr, schema: &DFSchema) -> Result<Expr> {
    let dtype = data_type(&value, schema)?;
    let boolean_value = if matches!(dtype, DataType::Boolean) {
        value.is_true()
    } else if is_numeric_datatype(&dtype) {
        value.not_eq(lit(0)).is_true()
    } else {
        try_cast(value, DataType::Boolean).is_true()
    };
    Ok(boolean_value)
}

/// Cast an expression to Float64 if not already numeric
pub fn to_numeric(value: Expr, schema: &DFSchema) -> Result<Expr> {
    let dtype = data_type(&value, schema)?;
    if is_numeric_datatype(&dtype) {
        Ok(value)
    } else {
        Ok(try_cast(value, DataType::Float64))
    }
}

pub fn cast_to(value: Expr, cast_dtype: &DataType, schema: &DFSchema) -> Result<Expr> {
    let dtype = data_type(&value, schema)?;
    if &dtype == cast_dtype {
        Ok(value)
    } else {
        Ok(try_cast(value, cast_dtype.clone()))
    }
}
