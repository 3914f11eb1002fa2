//! Build a client-side schema from a standard introspection result
//!
//! The introspection JSON is printed back to SDL and parsed with
//! `apollo-compiler`, so the resulting schema is validated the same way as
//! any hand-written one.

use std::fmt::Write as _;

use apollo_compiler::{Schema, validation::Valid};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::IntrospectionError;

/// The standard introspection query
pub const INTROSPECTION_QUERY: &str = r#"query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types {
      ...FullType
    }
    directives {
      name
      description
      locations
      args {
        ...InputValue
      }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args {
      ...InputValue
    }
    type {
      ...TypeRef
    }
    isDeprecated
    deprecationReason
  }
  inputFields {
    ...InputValue
  }
  interfaces {
    ...TypeRef
  }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes {
    ...TypeRef
  }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}"#;

const BUILT_IN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];
const BUILT_IN_DIRECTIVES: [&str; 5] = ["skip", "include", "deprecated", "specifiedBy", "oneOf"];

#[derive(Debug, Deserialize)]
struct IntrospectionData {
    #[serde(rename = "__schema")]
    schema: IntrospectionSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionSchema {
    query_type: Option<NamedRef>,
    mutation_type: Option<NamedRef>,
    subscription_type: Option<NamedRef>,
    types: Vec<FullType>,
    #[serde(default)]
    directives: Vec<DirectiveDef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullType {
    kind: TypeKind,
    name: String,
    description: Option<String>,
    fields: Option<Vec<FieldDef>>,
    input_fields: Option<Vec<InputValue>>,
    interfaces: Option<Vec<TypeRef>>,
    enum_values: Option<Vec<EnumValueDef>>,
    possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDef {
    name: String,
    description: Option<String>,
    #[serde(default)]
    args: Vec<InputValue>,
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default)]
    is_deprecated: bool,
    deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputValue {
    name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    ty: TypeRef,
    default_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnumValueDef {
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_deprecated: bool,
    deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeRef {
    kind: TypeKind,
    name: Option<String>,
    of_type: Option<Box<TypeRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectiveDef {
    name: String,
    description: Option<String>,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    args: Vec<InputValue>,
    #[serde(default)]
    is_repeatable: bool,
}

/// Build a validated schema from the `data` of an introspection response
pub fn build_client_schema(introspection: &Value) -> Result<Valid<Schema>, IntrospectionError> {
    let sdl = introspection_to_sdl(introspection)?;
    Schema::parse_and_validate(sdl, "introspection.graphql")
        .map_err(|errors| IntrospectionError::Schema(Box::new(errors)))
}

/// Print the `data` of an introspection response as SDL
pub fn introspection_to_sdl(introspection: &Value) -> Result<String, IntrospectionError> {
    let IntrospectionData { schema } = IntrospectionData::deserialize(introspection)?;
    let mut sdl = String::new();

    print_schema_definition(&mut sdl, &schema);

    for directive in &schema.directives {
        if BUILT_IN_DIRECTIVES.contains(&directive.name.as_str()) || directive.locations.is_empty()
        {
            continue;
        }
        print_description(&mut sdl, directive.description.as_deref(), "");
        let _ = write!(sdl, "directive @{}", directive.name);
        print_arguments(&mut sdl, &directive.args, &directive.name)?;
        if directive.is_repeatable {
            sdl.push_str(" repeatable");
        }
        let _ = writeln!(sdl, " on {}\n", directive.locations.join(" | "));
    }

    for ty in &schema.types {
        if ty.name.starts_with("__")
            || (ty.kind == TypeKind::Scalar && BUILT_IN_SCALARS.contains(&ty.name.as_str()))
        {
            continue;
        }
        print_type(&mut sdl, ty)?;
    }

    Ok(sdl)
}

fn print_schema_definition(sdl: &mut String, schema: &IntrospectionSchema) {
    let roots: Vec<(&str, &NamedRef)> = [
        ("query", schema.query_type.as_ref()),
        ("mutation", schema.mutation_type.as_ref()),
        ("subscription", schema.subscription_type.as_ref()),
    ]
    .into_iter()
    .filter_map(|(operation, root)| root.map(|root| (operation, root)))
    .collect();

    if roots.is_empty() {
        return;
    }

    sdl.push_str("schema {\n");
    for (operation, root) in roots {
        let _ = writeln!(sdl, "  {operation}: {}", root.name);
    }
    sdl.push_str("}\n\n");
}

fn print_type(sdl: &mut String, ty: &FullType) -> Result<(), IntrospectionError> {
    print_description(sdl, ty.description.as_deref(), "");
    match ty.kind {
        TypeKind::Scalar => {
            let _ = writeln!(sdl, "scalar {}", ty.name);
        }
        TypeKind::Object | TypeKind::Interface => {
            let keyword = if ty.kind == TypeKind::Object {
                "type"
            } else {
                "interface"
            };
            let _ = write!(sdl, "{keyword} {}", ty.name);
            let interfaces = named_refs(ty.interfaces.as_deref().unwrap_or_default(), &ty.name)?;
            if !interfaces.is_empty() {
                let _ = write!(sdl, " implements {}", interfaces.join(" & "));
            }
            let fields = ty.fields.as_deref().unwrap_or_default();
            if !fields.is_empty() {
                sdl.push_str(" {\n");
                for field in fields {
                    print_description(sdl, field.description.as_deref(), "  ");
                    let _ = write!(sdl, "  {}", field.name);
                    print_arguments(sdl, &field.args, &ty.name)?;
                    let _ = write!(sdl, ": {}", type_ref(&field.ty, &ty.name)?);
                    print_deprecation(sdl, field.is_deprecated, field.deprecation_reason.as_deref());
                    sdl.push('\n');
                }
                sdl.push('}');
            }
            sdl.push('\n');
        }
        TypeKind::Union => {
            let members = named_refs(ty.possible_types.as_deref().unwrap_or_default(), &ty.name)?;
            let _ = writeln!(sdl, "union {} = {}", ty.name, members.join(" | "));
        }
        TypeKind::Enum => {
            let _ = writeln!(sdl, "enum {} {{", ty.name);
            for value in ty.enum_values.as_deref().unwrap_or_default() {
                print_description(sdl, value.description.as_deref(), "  ");
                let _ = write!(sdl, "  {}", value.name);
                print_deprecation(sdl, value.is_deprecated, value.deprecation_reason.as_deref());
                sdl.push('\n');
            }
            sdl.push_str("}\n");
        }
        TypeKind::InputObject => {
            let _ = writeln!(sdl, "input {} {{", ty.name);
            for field in ty.input_fields.as_deref().unwrap_or_default() {
                print_description(sdl, field.description.as_deref(), "  ");
                let _ = write!(sdl, "  {}", input_value(field, &ty.name)?);
                sdl.push('\n');
            }
            sdl.push_str("}\n");
        }
        TypeKind::List | TypeKind::NonNull => {
            return Err(IntrospectionError::MalformedTypeRef(ty.name.clone()));
        }
    }
    sdl.push('\n');
    Ok(())
}

fn print_arguments(
    sdl: &mut String,
    args: &[InputValue],
    owner: &str,
) -> Result<(), IntrospectionError> {
    if args.is_empty() {
        return Ok(());
    }
    let args = args
        .iter()
        .map(|arg| {
            let description = arg
                .description
                .as_deref()
                .map(|description| format!("{} ", string_literal(description)))
                .unwrap_or_default();
            Ok(format!("{description}{}", input_value(arg, owner)?))
        })
        .collect::<Result<Vec<_>, IntrospectionError>>()?;
    let _ = write!(sdl, "({})", args.join(", "));
    Ok(())
}

fn input_value(value: &InputValue, owner: &str) -> Result<String, IntrospectionError> {
    let mut printed = format!("{}: {}", value.name, type_ref(&value.ty, owner)?);
    if let Some(default) = &value.default_value {
        let _ = write!(printed, " = {default}");
    }
    Ok(printed)
}

fn print_description(sdl: &mut String, description: Option<&str>, indent: &str) {
    if let Some(description) = description.filter(|description| !description.is_empty()) {
        let _ = writeln!(sdl, "{indent}{}", string_literal(description));
    }
}

fn print_deprecation(sdl: &mut String, is_deprecated: bool, reason: Option<&str>) {
    if !is_deprecated {
        return;
    }
    match reason {
        Some(reason) => {
            let _ = write!(sdl, " @deprecated(reason: {})", string_literal(reason));
        }
        None => sdl.push_str(" @deprecated"),
    }
}

/// JSON string escapes are a subset of GraphQL string escapes
fn string_literal(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn type_ref(ty: &TypeRef, owner: &str) -> Result<String, IntrospectionError> {
    let malformed = || IntrospectionError::MalformedTypeRef(owner.to_string());
    match ty.kind {
        TypeKind::NonNull => {
            let inner = ty.of_type.as_deref().ok_or_else(malformed)?;
            Ok(format!("{}!", type_ref(inner, owner)?))
        }
        TypeKind::List => {
            let inner = ty.of_type.as_deref().ok_or_else(malformed)?;
            Ok(format!("[{}]", type_ref(inner, owner)?))
        }
        _ => ty.name.clone().ok_or_else(malformed),
    }
}

fn named_refs(refs: &[TypeRef], owner: &str) -> Result<Vec<String>, IntrospectionError> {
    refs.iter()
        .map(|ty| {
            ty.name
                .clone()
                .ok_or_else(|| IntrospectionError::MalformedTypeRef(owner.to_string()))
        })
        .collect()
}
