//! Detection of compiler-generated metadata elements.
//!
//! Language compilers synthesize closure display classes, iterator and async
//! state machines, and auto-property backing fields. Widening those elements
//! serves no consumer and risks colliding with compiler assumptions, so the
//! rewriter skips them. An element counts as generated when a
//! `CompilerGeneratedAttribute` annotation is attached, or when its name
//! starts with `<`, the character compilers use for unspeakable names
//! (`<>c__DisplayClass0_0`, `<Count>k__BackingField`, `<Run>d__3`).
//!
//! The name check also catches the synthesized `<Module>` type, which must
//! never be widened. Properties and their accessors are deliberately exempt
//! from this filter: auto-property accessors carry the compiler-generated
//! annotation yet are primary widening targets.

/// Name fragment identifying the compiler-generated annotation, matched
/// against qualified annotation type names.
const GENERATED_FRAGMENT: &str = "CompilerGeneratedAttribute";

fn has_generated_attribute(attribute_names: &[String]) -> bool {
    attribute_names
        .iter()
        .any(|name| name.contains(GENERATED_FRAGMENT))
}

fn has_unspeakable_name(name: &str) -> bool {
    name.starts_with('<')
}

/// True when a type is compiler-generated and must be left untouched,
/// together with everything it declares.
pub fn is_generated_type(name: &str, attribute_names: &[String]) -> bool {
    has_unspeakable_name(name) || has_generated_attribute(attribute_names)
}

/// True when a field is compiler-generated and must be left untouched.
pub fn is_generated_field(name: &str, attribute_names: &[String]) -> bool {
    has_unspeakable_name(name) || has_generated_attribute(attribute_names)
}

/// True when a method is compiler-generated and must be left untouched.
pub fn is_generated_method(name: &str, attribute_names: &[String]) -> bool {
    has_unspeakable_name(name) || has_generated_attribute(attribute_names)
}
