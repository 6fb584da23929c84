use connectors::adapter::PackageText;
use model::migration::package::{
    MemberKind, MigrationNote, PackageUnit, ParamDirection, Parameter, Visibility,
};
use plsql_syntax::{
    package::{
        MemberDecl, PackageItem, PackageItemKind, ParamMode, SubprogramKind,
        scan_package_body, scan_package_spec,
    },
    tokens::mask_literals,
};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Result of decomposing one Oracle package into standalone units.
#[derive(Debug, Clone)]
pub struct DecomposedPackage {
    pub package_name: String,
    pub units: Vec<PackageUnit>,
    pub notes: Vec<MigrationNote>,
    /// Members the scanner could not parse; decomposition continued.
    pub failures: Vec<String>,
}

/// Splits a package spec+body into standalone procedure/function units with
/// mangled names, preserved visibility, and internal calls rewritten to the
/// new names. Package-level state is reported, never silently dropped.
pub fn decompose(package_name_hint: &str, text: &PackageText) -> DecomposedPackage {
    let spec_scan = scan_package_spec(&text.spec);
    let body_scan = scan_package_body(&text.body);

    let package_name = spec_scan
        .package_name
        .clone()
        .or_else(|| body_scan.package_name.clone())
        .unwrap_or_else(|| package_name_hint.to_uppercase());

    let mut failures = spec_scan.failures.clone();
    failures.extend(body_scan.failures.clone());

    let mut notes = Vec::new();
    for item in spec_scan.items.iter().chain(body_scan.items.iter()) {
        notes.push(note_for(&package_name, item));
    }

    let mut units = build_units(&package_name, &spec_scan.members, &body_scan.members, &mut notes);

    // Internal calls must use the mangled names once the members stand alone.
    let directory: Vec<(String, usize)> = units
        .iter()
        .enumerate()
        .map(|(idx, unit)| (unit.member_name.clone(), idx))
        .collect();
    let rewrites: Vec<(String, Vec<String>)> = units
        .iter()
        .map(|unit| rewrite_member_calls(&package_name, &unit.body, &units, &directory))
        .collect();
    for (unit, (body, deps)) in units.iter_mut().zip(rewrites) {
        unit.body = body;
        unit.member_dependencies = deps;
    }

    debug!(
        package = %package_name,
        units = units.len(),
        notes = notes.len(),
        "package decomposed"
    );

    DecomposedPackage {
        package_name,
        units,
        notes,
        failures,
    }
}

fn build_units(
    package_name: &str,
    spec_members: &[MemberDecl],
    body_members: &[MemberDecl],
    notes: &mut Vec<MigrationNote>,
) -> Vec<PackageUnit> {
    // Overload indexes follow order of appearance in the spec; private
    // members follow order of appearance in the body.
    // Name keys are uppercased: PL/SQL resolves unquoted identifiers
    // case-insensitively.
    let mut name_totals: BTreeMap<String, usize> = BTreeMap::new();
    for member in spec_members {
        *name_totals.entry(member.name.to_uppercase()).or_default() += 1;
    }

    let spec_names: Vec<String> = spec_members
        .iter()
        .map(|m| m.name.to_uppercase())
        .collect();
    let implementations: Vec<&MemberDecl> =
        body_members.iter().filter(|m| m.body.is_some()).collect();
    let mut claimed = vec![false; implementations.len()];

    let mut units = Vec::new();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for decl in spec_members {
        let overload_index = {
            let counter = seen.entry(decl.name.to_uppercase()).or_default();
            let idx = *counter;
            *counter += 1;
            idx
        };
        let implementation = claim_implementation(decl, &implementations, &mut claimed);
        let body = match implementation {
            Some(impl_decl) => impl_decl.body.clone().unwrap_or_default(),
            None => {
                notes.push(MigrationNote {
                    package_name: package_name.to_string(),
                    summary: format!("member {} declared in spec has no body implementation", decl.name),
                    snippet: String::new(),
                });
                String::new()
            }
        };
        units.push(to_unit(
            package_name,
            implementation.unwrap_or(decl),
            Visibility::Public,
            overload_index,
            name_totals.get(&decl.name.to_uppercase()).copied().unwrap_or(1) > 1,
            body,
        ));
    }

    // Private members: implemented in the body, absent from the spec.
    let mut private_totals: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, member) in implementations.iter().enumerate() {
        if !claimed[idx] && !spec_names.contains(&member.name.to_uppercase()) {
            *private_totals.entry(member.name.to_uppercase()).or_default() += 1;
        }
    }
    let mut private_seen: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, member) in implementations.iter().enumerate() {
        if claimed[idx] || spec_names.contains(&member.name.to_uppercase()) {
            continue;
        }
        let overload_index = {
            let counter = private_seen.entry(member.name.to_uppercase()).or_default();
            let i = *counter;
            *counter += 1;
            i
        };
        units.push(to_unit(
            package_name,
            member,
            Visibility::Private,
            overload_index,
            private_totals.get(&member.name.to_uppercase()).copied().unwrap_or(1) > 1,
            member.body.clone().unwrap_or_default(),
        ));
    }

    units
}

/// Finds the unclaimed implementation matching a spec declaration: same
/// name and arity first, then same name alone.
fn claim_implementation<'a>(
    decl: &MemberDecl,
    implementations: &[&'a MemberDecl],
    claimed: &mut [bool],
) -> Option<&'a MemberDecl> {
    let by_arity = implementations.iter().enumerate().position(|(idx, m)| {
        !claimed[idx]
            && m.name.eq_ignore_ascii_case(&decl.name)
            && m.parameters.len() == decl.parameters.len()
    });
    let found = by_arity.or_else(|| {
        implementations
            .iter()
            .enumerate()
            .position(|(idx, m)| !claimed[idx] && m.name.eq_ignore_ascii_case(&decl.name))
    });
    found.map(|idx| {
        claimed[idx] = true;
        implementations[idx]
    })
}

fn to_unit(
    package_name: &str,
    member: &MemberDecl,
    visibility: Visibility,
    overload_index: usize,
    is_overloaded: bool,
    body: String,
) -> PackageUnit {
    PackageUnit {
        package_name: package_name.to_string(),
        member_name: member.name.clone(),
        overload_index,
        is_overloaded,
        kind: match member.kind {
            SubprogramKind::Procedure => MemberKind::Procedure,
            SubprogramKind::Function => MemberKind::Function,
        },
        visibility,
        parameters: member
            .parameters
            .iter()
            .map(|p| Parameter {
                name: p.name.clone(),
                direction: match p.mode {
                    ParamMode::In => ParamDirection::In,
                    ParamMode::Out => ParamDirection::Out,
                    ParamMode::InOut => ParamDirection::InOut,
                },
                data_type: p.data_type.clone(),
            })
            .collect(),
        return_type: member.return_type.clone(),
        body,
        member_dependencies: Vec::new(),
    }
}

fn note_for(package_name: &str, item: &PackageItem) -> MigrationNote {
    let summary = match item.kind {
        PackageItemKind::Variable => {
            "package-level variable requires manual conversion (no package state on the target)"
        }
        PackageItemKind::Type => "package-level type requires manual conversion",
        PackageItemKind::Cursor => "package-level cursor requires manual conversion",
        PackageItemKind::InitBlock => {
            "package initialization block requires manual conversion"
        }
        PackageItemKind::Pragma => "package pragma has no target equivalent",
    };
    MigrationNote {
        package_name: package_name.to_string(),
        summary: summary.to_string(),
        snippet: item.snippet.clone(),
    }
}

/// One call site found in a member body.
struct CallSite {
    start: usize,
    end: usize,
    arity: Option<usize>,
}

/// Rewrites calls to sibling members (bare or package-qualified) to their
/// mangled standalone names. Returns the rewritten body and the mangled
/// names this member depends on.
fn rewrite_member_calls(
    package_name: &str,
    body: &str,
    units: &[PackageUnit],
    directory: &[(String, usize)],
) -> (String, Vec<String>) {
    if body.is_empty() {
        return (String::new(), Vec::new());
    }
    let masked = mask_literals(body);
    let mut edits: Vec<(CallSite, String)> = Vec::new();
    let mut deps: Vec<String> = Vec::new();

    let mut names: Vec<&str> = directory.iter().map(|(n, _)| n.as_str()).collect();
    names.sort_unstable();
    names.dedup();

    for name in names {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))
            .expect("member name regex");
        for found in pattern.find_iter(&masked) {
            let Some(site) = classify_call_site(&masked, package_name, name, found.start(), found.end())
            else {
                continue;
            };
            let candidates: Vec<&PackageUnit> = units
                .iter()
                .filter(|u| u.member_name.eq_ignore_ascii_case(name))
                .collect();
            let Some(unit) = select_overload(&candidates, site.arity) else {
                continue;
            };
            let mangled = unit.target_name();
            if !deps.contains(&mangled) {
                deps.push(mangled.clone());
            }
            edits.push((site, mangled));
        }
    }

    // Apply from the back so earlier offsets stay valid.
    edits.sort_by_key(|(site, _)| std::cmp::Reverse(site.start));
    let mut rewritten = body.to_string();
    for (site, replacement) in edits {
        rewritten.replace_range(site.start..site.end, &replacement);
    }
    (rewritten, deps)
}

/// Decides whether a name occurrence is a rewritable call site. Definition
/// headers (`PROCEDURE name`), block closers (`END name`) and other
/// packages' qualified members are left alone. A `PKG.name` reference to
/// this package is rewritten including the qualifier.
fn classify_call_site(
    masked: &str,
    package_name: &str,
    _name: &str,
    start: usize,
    end: usize,
) -> Option<CallSite> {
    let before = masked[..start].trim_end();
    let mut site_start = start;

    if before.ends_with('.') {
        let qualifier_end = before.len() - 1;
        let qualifier = masked[..qualifier_end]
            .trim_end()
            .rsplit(|c: char| !c.is_alphanumeric() && c != '_' && c != '$' && c != '#')
            .next()
            .unwrap_or("");
        if !qualifier.eq_ignore_ascii_case(package_name) {
            return None;
        }
        site_start = masked[..qualifier_end]
            .trim_end()
            .len()
            .saturating_sub(qualifier.len());
    } else {
        let last_word = before
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_uppercase();
        if matches!(last_word.as_str(), "PROCEDURE" | "FUNCTION" | "END") {
            return None;
        }
    }

    // Arity from the argument list, when the call has one.
    let rest = &masked[end..];
    let after = rest.trim_start();
    let arity = if after.starts_with('(') {
        let open = end + (rest.len() - after.len());
        Some(count_call_args(masked, open))
    } else {
        Some(0)
    };

    Some(CallSite {
        start: site_start,
        end,
        arity,
    })
}

/// Counts top-level arguments of the parenthesized list opening at `open`.
fn count_call_args(masked: &str, open: usize) -> usize {
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut non_empty = false;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            b',' if depth == 1 => commas += 1,
            c if depth >= 1 && !c.is_ascii_whitespace() => non_empty = true,
            _ => {}
        }
        i += 1;
    }
    if !non_empty { 0 } else { commas + 1 }
}

/// Picks the overload whose parameter count can accept `arity` arguments
/// (defaults make trailing parameters optional); first match by overload
/// order wins.
fn select_overload<'a>(
    candidates: &[&'a PackageUnit],
    arity: Option<usize>,
) -> Option<&'a PackageUnit> {
    match candidates {
        [] => None,
        [single] => Some(single),
        several => {
            let arity = arity.unwrap_or(0);
            let mut sorted: Vec<&&PackageUnit> = several.iter().collect();
            sorted.sort_by_key(|u| u.overload_index);
            sorted
                .iter()
                .find(|u| u.parameters.len() == arity)
                .or_else(|| sorted.iter().find(|u| u.parameters.len() >= arity))
                .map(|u| **u)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg_text(spec: &str, body: &str) -> PackageText {
        PackageText {
            spec: spec.to_string(),
            body: body.to_string(),
        }
    }

    const OVERLOAD_SPEC: &str = r#"
CREATE OR REPLACE PACKAGE PKG_X IS
  PROCEDURE process(p_id NUMBER);
  PROCEDURE process(p_name VARCHAR2);
  PROCEDURE process(p_id NUMBER, p_date DATE);
END PKG_X;
"#;

    const OVERLOAD_BODY: &str = r#"
CREATE OR REPLACE PACKAGE BODY PKG_X IS
  PROCEDURE audit(p_msg VARCHAR2) IS
  BEGIN
    NULL;
  END audit;

  PROCEDURE process(p_id NUMBER) IS
  BEGIN
    audit('one');
  END;

  PROCEDURE process(p_name VARCHAR2) IS
  BEGIN
    audit('two');
  END;

  PROCEDURE process(p_id NUMBER, p_date DATE) IS
  BEGIN
    process(p_id);
    PKG_X.process(p_id, p_date);
  END;
END PKG_X;
"#;

    #[test]
    fn overloads_are_numbered_in_spec_order() {
        let decomposed = decompose("PKG_X", &pkg_text(OVERLOAD_SPEC, OVERLOAD_BODY));
        let names: Vec<String> = decomposed.units.iter().map(|u| u.target_name()).collect();
        assert!(names.contains(&"PKG_X_process_v0".to_string()));
        assert!(names.contains(&"PKG_X_process_v1".to_string()));
        assert!(names.contains(&"PKG_X_process_v2".to_string()));
        assert!(names.contains(&"PKG_X__internal_audit".to_string()));
        assert_eq!(decomposed.units.len(), 4);
    }

    #[test]
    fn unit_count_matches_spec_plus_private() {
        let decomposed = decompose("PKG_X", &pkg_text(OVERLOAD_SPEC, OVERLOAD_BODY));
        let public = decomposed
            .units
            .iter()
            .filter(|u| u.visibility == Visibility::Public)
            .count();
        let private = decomposed
            .units
            .iter()
            .filter(|u| u.visibility == Visibility::Private)
            .count();
        assert_eq!(public, 3);
        assert_eq!(private, 1);
    }

    #[test]
    fn internal_calls_are_rewritten_by_arity() {
        let decomposed = decompose("PKG_X", &pkg_text(OVERLOAD_SPEC, OVERLOAD_BODY));
        let two_arg = decomposed
            .units
            .iter()
            .find(|u| u.overload_index == 2 && u.member_name == "process")
            .unwrap();
        // One-argument call resolves to the first matching overload; the
        // qualified two-argument call resolves to this unit itself.
        assert!(two_arg.body.contains("PKG_X_process_v0(p_id)"));
        assert!(two_arg.body.contains("PKG_X_process_v2(p_id, p_date)"));
        assert!(!two_arg.body.contains("PKG_X.process"));
    }

    #[test]
    fn private_helper_calls_use_internal_name() {
        let decomposed = decompose("PKG_X", &pkg_text(OVERLOAD_SPEC, OVERLOAD_BODY));
        let first = decomposed
            .units
            .iter()
            .find(|u| u.overload_index == 0 && u.member_name == "process")
            .unwrap();
        assert!(first.body.contains("PKG_X__internal_audit('one')"));
        assert!(
            first
                .member_dependencies
                .contains(&"PKG_X__internal_audit".to_string())
        );
    }

    #[test]
    fn definition_headers_are_not_rewritten() {
        let decomposed = decompose("PKG_X", &pkg_text(OVERLOAD_SPEC, OVERLOAD_BODY));
        let audit = decomposed
            .units
            .iter()
            .find(|u| u.member_name == "audit")
            .unwrap();
        assert!(audit.body.contains("PROCEDURE audit"));
        assert!(audit.body.contains("END audit"));
    }

    #[test]
    fn package_state_becomes_notes() {
        let spec = r#"
PACKAGE PKG_S IS
  g_counter NUMBER := 0;
  CURSOR c_all IS SELECT 1 FROM dual;
  PROCEDURE run;
END PKG_S;
"#;
        let body = r#"
PACKAGE BODY PKG_S IS
  PROCEDURE run IS
  BEGIN
    g_counter := g_counter + 1;
  END run;
BEGIN
  g_counter := 10;
END PKG_S;
"#;
        let decomposed = decompose("PKG_S", &pkg_text(spec, body));
        assert_eq!(decomposed.units.len(), 1);
        let summaries: Vec<&str> = decomposed.notes.iter().map(|n| n.summary.as_str()).collect();
        assert!(summaries.iter().any(|s| s.contains("variable")));
        assert!(summaries.iter().any(|s| s.contains("cursor")));
        assert!(summaries.iter().any(|s| s.contains("initialization block")));
    }

    #[test]
    fn decomposition_survives_a_bad_member() {
        let spec = "PACKAGE P IS PROCEDURE ; PROCEDURE ok(p NUMBER); END P;";
        let body = "PACKAGE BODY P IS PROCEDURE ok(p NUMBER) IS BEGIN NULL; END; END P;";
        let decomposed = decompose("P", &pkg_text(spec, body));
        assert_eq!(decomposed.failures.len(), 1);
        assert_eq!(decomposed.units.len(), 1);
        assert_eq!(decomposed.units[0].member_name, "ok");
    }
}
