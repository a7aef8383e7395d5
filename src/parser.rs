use chrono::Utc;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::errors::{PipelineError, PipelineResult};
use crate::models::{
    BulletPoint, EducationEntry, ExperienceEntry, MacroDefinition, ParseWarning, PersonalInfo,
    ProjectEntry, Resume, SkillsSection,
};

/// A section of the document located by a `\section{...}` (or `\subsection`) marker.
struct LatexSection {
    level: u8,
    title: String,
    content: String,
}

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\\name\s*\{([^}]+)\}").unwrap());
static AUTHOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\author\s*\{([^}]+)\}").unwrap());
static EMAIL_CMD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\email\s*\{([^}]+)\}").unwrap());
static EMAIL_BARE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());
static PHONE_CMD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\(?:phone|mobile)\s*\{([^}]+)\}").unwrap());
static PHONE_BARE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d{1,3}[\s-]?\d{3,4}[\s-]?\d{4,}").unwrap());
static LOCATION_CMD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\(?:location|address)\s*\{([^}]+)\}").unwrap());
static LINKEDIN_CMD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\linkedin\s*\{([^}]+)\}").unwrap());
static LINKEDIN_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"linkedin\.com/in/([a-zA-Z0-9-]+)").unwrap());
static GITHUB_CMD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\github\s*\{([^}]+)\}").unwrap());
static GITHUB_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"github\.com/([a-zA-Z0-9-]+)").unwrap());
static NAME_FROM_BFSERIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\\(?:Huge|LARGE|Large|large)?\s*\\bfseries\s+([A-Z][a-zA-Z\s]+?)(?:\\\\|\})")
        .unwrap()
});

static SECTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\section\*?\s*\{([^}]+)\}").unwrap());
static SUBSECTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\subsection\*?\s*\{([^}]+)\}").unwrap());
static SUBSUBSECTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\subsubsection\*?\s*\{([^}]+)\}").unwrap());

static RESUME_SUBHEADING_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\resumeSubheading\s*\{").unwrap());
static RESUME_ITEM_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\resumeItem\s*\{").unwrap());
static ITEM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\item\s+(.+?)(?=\\item|\\end\{(?:itemize|enumerate)\}|$)").unwrap()
});
static ITEMIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\begin\{itemize\}(?:\[[^\]]*\])?(.*?)\\end\{itemize\}").unwrap()
});
static ENUMERATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\begin\{enumerate\}(?:\[[^\]]*\])?(.*?)\\end\{enumerate\}").unwrap()
});
static EXPERIENCE_TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(.+?)\s*(?:--|—|\||@)\s*(.+?)$").unwrap());
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{4}")
        .unwrap()
});
static NEWCOMMAND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:new|renew)command\s*\{\\(\w+)\}(?:\[(\d+)\])?\s*\{").unwrap()
});
static LATEX_COMMAND_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\*?(?:\[[^\]]*\])?").unwrap());
static CATEGORY_LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([A-Za-z\s]+):\s*([^\n]+)").unwrap());

/// Finds the end of a balanced `{...}` group starting at the opening brace position.
/// Returns `(content, index_of_closing_brace)`; on unbalanced input returns the remainder.
fn extract_balanced_braces(text: &str, start_pos: usize) -> (String, usize) {
    let bytes: Vec<char> = text.chars().collect();
    if start_pos >= bytes.len() || bytes[start_pos] != '{' {
        return (String::new(), start_pos);
    }

    let mut depth = 0i32;
    let mut i = start_pos;
    while i < bytes.len() {
        match bytes[i] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let content: String = bytes[start_pos + 1..i].iter().collect();
                    return (content, i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    let content: String = bytes[start_pos + 1..].iter().collect();
    (content, bytes.len())
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && matches!(chars[pos], ' ' | '\t' | '\n') {
        pos += 1;
    }
    pos
}

/// Strips LaTeX commands/macros down to the text they carry. There is no
/// general-purpose LaTeX-to-text converter in the ecosystem comparable to
/// pylatexenc, so this is a deliberately blunt regex pass: it keeps braced
/// arguments, drops control sequences, and collapses whitespace.
fn latex_to_text(input: &str) -> String {
    let mut text = input.to_string();
    // \command{arg} -> arg (repeat until stable to unwrap nested commands)
    let wrapped = Regex::new(r"\\[a-zA-Z]+\*?(?:\[[^\]]*\])?\{([^{}]*)\}").unwrap();
    for _ in 0..6 {
        let replaced = wrapped.replace_all(&text, "$1").to_string();
        if replaced == text {
            break;
        }
        text = replaced;
    }
    text = LATEX_COMMAND_STRIP.replace_all(&text, "").to_string();
    text = text.replace("\\\\", " ").replace('%', "");
    text = text.replace('{', "").replace('}', "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    text.trim().to_string()
}

/// Builds the table of `\newcommand`/`\renewcommand` definitions and a best-effort
/// zero-argument expansion for each, following the macro-expander's regex fallback
/// path since no pylatexenc-equivalent crate exists for structural LaTeX parsing.
fn extract_macro_definitions(content: &str) -> HashMap<String, MacroDefinition> {
    let mut macros = HashMap::new();

    for caps in NEWCOMMAND_PATTERN.captures_iter(content) {
        let name = caps.get(1).unwrap().as_str().to_string();
        let arity: Option<usize> = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let brace_pos = caps.get(0).unwrap().end() - 1;

        let (body, _) = extract_balanced_braces(content, brace_pos);
        let expanded = if arity.unwrap_or(0) == 0 {
            latex_to_text(&body)
        } else {
            String::new()
        };

        macros.insert(
            name.clone(),
            MacroDefinition {
                name,
                arity,
                body,
                expanded,
            },
        );
    }

    macros
}

fn remove_macro_definitions(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for caps in NEWCOMMAND_PATTERN.captures_iter(content) {
        let whole = caps.get(0).unwrap();
        let brace_pos = whole.end() - 1;
        let (_, end) = extract_balanced_braces(content, brace_pos);
        out.push_str(&content[last..whole.start()]);
        last = (end + 1).min(content.len());
    }
    out.push_str(&content[last..]);
    out
}

/// Expands bare zero-argument macro calls (`\macroname`) found in `text` using the
/// table built by [`extract_macro_definitions`]. Calls with arguments are left as-is.
fn expand_text(text: &str, macros: &HashMap<String, MacroDefinition>) -> String {
    let mut out = text.to_string();
    for (name, def) in macros {
        if def.arity.unwrap_or(0) != 0 {
            continue;
        }
        let pattern = Regex::new(&format!(r"\\{}\b(?:\{{\}})?", regex::escape(name))).unwrap();
        out = pattern.replace_all(&out, def.expanded.as_str()).to_string();
    }
    out
}

fn find_macro_in_text(text: &str, macros: &HashMap<String, MacroDefinition>) -> Option<String> {
    for name in macros.keys() {
        let pattern = Regex::new(&format!(r"\\{}\b", regex::escape(name))).unwrap();
        if pattern.is_match(text) {
            return Some(name.clone());
        }
    }
    None
}

fn extract_sections(content: &str) -> Vec<LatexSection> {
    struct Marker {
        level: u8,
        title: String,
        start: usize,
        end: usize,
    }

    let mut markers = Vec::new();
    for caps in SECTION_PATTERN.captures_iter(content) {
        let m = caps.get(0).unwrap();
        markers.push(Marker {
            level: 1,
            title: caps.get(1).unwrap().as_str().trim().to_string(),
            start: m.start(),
            end: m.end(),
        });
    }
    for caps in SUBSECTION_PATTERN.captures_iter(content) {
        let m = caps.get(0).unwrap();
        markers.push(Marker {
            level: 2,
            title: caps.get(1).unwrap().as_str().trim().to_string(),
            start: m.start(),
            end: m.end(),
        });
    }
    for caps in SUBSUBSECTION_PATTERN.captures_iter(content) {
        let m = caps.get(0).unwrap();
        markers.push(Marker {
            level: 3,
            title: caps.get(1).unwrap().as_str().trim().to_string(),
            start: m.start(),
            end: m.end(),
        });
    }
    markers.sort_by_key(|m| m.start);

    let mut sections = Vec::new();
    for (i, marker) in markers.iter().enumerate() {
        let mut end_pos = content.len();
        for next in &markers[i + 1..] {
            if next.level <= marker.level {
                end_pos = next.start;
                break;
            }
        }
        let body = content[marker.end..end_pos].trim().to_string();
        sections.push(LatexSection {
            level: marker.level,
            title: marker.title.clone(),
            content: body,
        });
    }
    sections
}

fn find_section<'a>(sections: &'a [LatexSection], name_pattern: &str) -> Option<&'a LatexSection> {
    let pattern = Regex::new(&format!("(?i){}", name_pattern)).ok()?;
    sections.iter().find(|s| pattern.is_match(&s.title))
}

fn extract_subsections(content: &str) -> Vec<(String, String)> {
    let matches: Vec<_> = SUBSECTION_PATTERN.captures_iter(content).collect();
    let mut out = Vec::new();
    for (i, caps) in matches.iter().enumerate() {
        let whole = caps.get(0).unwrap();
        let title = caps.get(1).unwrap().as_str().trim().to_string();
        let start = whole.end();
        let end = matches
            .get(i + 1)
            .map(|n| n.get(0).unwrap().start())
            .unwrap_or(content.len());
        out.push((title, content[start..end].trim().to_string()));
    }
    out
}

struct ItemizeBlock {
    items: Vec<String>,
}

fn extract_itemize_blocks(content: &str) -> Vec<ItemizeBlock> {
    let mut blocks = Vec::new();
    for caps in ITEMIZE_PATTERN.captures_iter(content) {
        let body = caps.get(1).unwrap().as_str();
        blocks.push(ItemizeBlock {
            items: extract_items(body),
        });
    }
    for caps in ENUMERATE_PATTERN.captures_iter(content) {
        let body = caps.get(1).unwrap().as_str();
        blocks.push(ItemizeBlock {
            items: extract_items(body),
        });
    }
    blocks
}

fn extract_items(content: &str) -> Vec<String> {
    ITEM_PATTERN
        .captures_iter(content)
        .filter_map(|c| {
            let text = c.get(1).unwrap().as_str().trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        })
        .collect()
}

fn slugify(value: &str) -> String {
    value
        .to_lowercase()
        .replace(' ', "_")
        .replace('&', "and")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Parses a LaTeX résumé document into a structured [`Resume`].
///
/// The document is read as plain text (no filesystem access here — callers read
/// the file and hand us the contents), giving the caller full control over I/O
/// errors and path validation.
pub struct ResumeParser;

impl ResumeParser {
    pub fn parse(source_text: &str) -> PipelineResult<Resume> {
        info!("parsing résumé document ({} bytes)", source_text.len());

        let content = strip_frontmatter(source_text);

        let macros = extract_macro_definitions(&content);
        let content_without_defs = remove_macro_definitions(&content);
        let sections = extract_sections(&content_without_defs);

        if sections.is_empty() {
            return Err(PipelineError::parse(
                "no \\section markers found in document",
            ));
        }

        let mut warnings = Vec::new();

        let personal = Self::extract_personal_info(&content);
        let summary = Self::extract_summary(&sections);
        let experience = Self::extract_experience(&sections, &macros, &mut warnings);
        let education = Self::extract_education(&sections, &mut warnings);
        let skills = Self::extract_skills(&sections, &mut warnings);
        let certifications = Self::extract_list_section(&sections, r"certifications?", &macros);
        let awards = Self::extract_list_section(&sections, r"awards?|honors?", &macros);
        let projects = Self::extract_projects(&sections);

        let mut all_bullets: Vec<BulletPoint> = Vec::new();
        for exp in &experience {
            all_bullets.extend(exp.bullets.clone());
        }

        info!(
            "parsed résumé: {} bullets, {} experience entries, {} education entries",
            all_bullets.len(),
            experience.len(),
            education.len()
        );

        Ok(Resume {
            personal,
            summary,
            experience,
            education,
            skills,
            projects,
            certifications,
            awards,
            all_bullets,
            macros,
            warnings,
            source_text: source_text.to_string(),
            parsed_at: Utc::now(),
        })
    }

    fn extract_personal_info(content: &str) -> PersonalInfo {
        let mut personal = PersonalInfo::default();

        if let Some(caps) = NAME_PATTERN.captures(content).or_else(|| AUTHOR_PATTERN.captures(content)) {
            personal.name = Some(latex_to_text(caps.get(1).unwrap().as_str()));
        }
        if personal.name.is_none() {
            if let Some(caps) = NAME_FROM_BFSERIES.captures(content) {
                personal.name = Some(caps.get(1).unwrap().as_str().trim().to_string());
            }
        }

        personal.email = EMAIL_CMD_PATTERN
            .captures(content)
            .map(|c| latex_to_text(c.get(1).unwrap().as_str()))
            .or_else(|| EMAIL_BARE_PATTERN.find(content).map(|m| m.as_str().to_string()));

        personal.phone = PHONE_CMD_PATTERN
            .captures(content)
            .map(|c| latex_to_text(c.get(1).unwrap().as_str()))
            .or_else(|| PHONE_BARE_PATTERN.find(content).map(|m| m.as_str().to_string()));

        personal.location = LOCATION_CMD_PATTERN
            .captures(content)
            .map(|c| latex_to_text(c.get(1).unwrap().as_str()));

        personal.linkedin = LINKEDIN_CMD_PATTERN
            .captures(content)
            .map(|c| latex_to_text(c.get(1).unwrap().as_str()))
            .or_else(|| {
                LINKEDIN_URL_PATTERN
                    .captures(content)
                    .map(|c| c.get(1).unwrap().as_str().to_string())
            });

        personal.github = GITHUB_CMD_PATTERN
            .captures(content)
            .map(|c| latex_to_text(c.get(1).unwrap().as_str()))
            .or_else(|| {
                GITHUB_URL_PATTERN
                    .captures(content)
                    .map(|c| c.get(1).unwrap().as_str().to_string())
            });

        personal
    }

    fn extract_summary(sections: &[LatexSection]) -> Option<String> {
        let section = find_section(sections, r"summary|objective|profile")?;
        let body = section
            .content
            .split("\\begin{itemize}")
            .next()
            .unwrap_or(&section.content)
            .split("\\begin{enumerate}")
            .next()
            .unwrap_or(&section.content);
        let text = latex_to_text(body);
        if text.len() > 50 {
            Some(text)
        } else {
            None
        }
    }

    fn extract_experience(
        sections: &[LatexSection],
        macros: &HashMap<String, MacroDefinition>,
        warnings: &mut Vec<ParseWarning>,
    ) -> Vec<ExperienceEntry> {
        let Some(exp_section) = find_section(sections, r"experience|work\s*history|employment")
        else {
            warnings.push(ParseWarning {
                section: "experience".to_string(),
                message: "no experience section found".to_string(),
            });
            return Vec::new();
        };

        let from_template = Self::parse_subheading_experience(&exp_section.content, macros);
        if !from_template.is_empty() {
            return from_template;
        }

        let mut out = Vec::new();
        for (title_line, body) in extract_subsections(&exp_section.content) {
            out.push(Self::parse_experience_entry(&title_line, &body, macros));
        }
        out
    }

    /// Parses entries using the custom four-argument `\resumeSubheading{title}{dates}{company}{location}`
    /// command, which this template's experience section uses in that explicit order.
    fn parse_subheading_experience(
        content: &str,
        macros: &HashMap<String, MacroDefinition>,
    ) -> Vec<ExperienceEntry> {
        let mut experiences = Vec::new();
        let chars: Vec<char> = content.chars().collect();

        for m in RESUME_SUBHEADING_START.find_iter(content) {
            let mut pos = char_index_of_byte(content, m.end()) - 1;

            let (title_text, end1) = extract_balanced_braces(content, pos);
            let title = latex_to_text(&title_text);
            pos = skip_whitespace(&chars, end1 + 1);

            let (date_text, end2) = extract_balanced_braces(content, pos);
            pos = skip_whitespace(&chars, end2 + 1);

            let (company_text, end3) = extract_balanced_braces(content, pos);
            let company = latex_to_text(&company_text);
            pos = skip_whitespace(&chars, end3 + 1);

            let (location_text, end4) = extract_balanced_braces(content, pos);
            let location = latex_to_text(&location_text);

            let dates: Vec<&str> = date_text.split("--").map(|d| d.trim()).collect();
            let start_date = dates.first().map(|s| s.to_string());
            let end_date = dates.get(1).map(|s| s.to_string()).or_else(|| start_date.clone());
            let is_current = end_date
                .as_deref()
                .map(|d| d.eq_ignore_ascii_case("present") || d.eq_ignore_ascii_case("current"))
                .unwrap_or(false);

            let rest_start = char_byte_index(content, end4 + 1);
            let rest = &content[rest_start..];
            let bullet_section = match RESUME_SUBHEADING_START.find(rest) {
                Some(next) => &rest[..next.start()],
                None => rest,
            };

            let mut bullets = Vec::new();
            for item_match in RESUME_ITEM_START.find_iter(bullet_section) {
                let item_pos = char_index_of_byte(bullet_section, item_match.end()) - 1;
                let (bullet_text, _) = extract_balanced_braces(bullet_section, item_pos);

                let expanded = expand_text(bullet_text.trim(), macros);
                let plain_text = latex_to_text(&expanded);
                let cmd_name = find_macro_in_text(&bullet_text, macros);

                bullets.push(BulletPoint {
                    id: format!("{}_{}", slugify(&company), bullets.len()),
                    text: plain_text,
                    section: "experience".to_string(),
                    subsection: Some(company.clone()),
                    is_modifiable: true,
                    command_name: cmd_name.clone(),
                    original_text: cmd_name.map(|_| bullet_text.clone()),
                    line_number: None,
                });
            }

            if !bullets.is_empty() {
                debug!("parsed experience: {} with {} bullets", company, bullets.len());
                experiences.push(ExperienceEntry {
                    title,
                    company,
                    location: Some(location),
                    start_date,
                    end_date,
                    bullets,
                    is_current,
                    line_number: None,
                });
            }
        }

        experiences
    }

    fn parse_experience_entry(
        title_line: &str,
        content: &str,
        macros: &HashMap<String, MacroDefinition>,
    ) -> ExperienceEntry {
        let (title, company) = match EXPERIENCE_TITLE_PATTERN.captures(title_line) {
            Some(caps) => (
                latex_to_text(caps.get(1).unwrap().as_str()),
                latex_to_text(caps.get(2).unwrap().as_str()),
            ),
            None => (latex_to_text(title_line), "Unknown".to_string()),
        };

        let dates: Vec<String> = DATE_PATTERN
            .find_iter(content)
            .map(|m| m.as_str().to_string())
            .collect();
        let start_date = dates.first().cloned();
        let end_date = dates.get(1).cloned().or_else(|| start_date.clone());

        let location_pattern = Regex::new(r"(?s)\\textit\{([^}]+)\}.*?\\hfill").unwrap();
        let location = location_pattern
            .captures(content)
            .map(|c| c.get(1).unwrap().as_str().to_string());

        let mut bullets = Vec::new();
        for block in extract_itemize_blocks(content) {
            for item_text in block.items {
                let expanded = expand_text(&item_text, macros);
                let plain_text = latex_to_text(&expanded);
                let cmd_name = find_macro_in_text(&item_text, macros);

                bullets.push(BulletPoint {
                    id: format!("{}_{}", slugify(&company), bullets.len()),
                    text: plain_text,
                    section: "experience".to_string(),
                    subsection: Some(company.clone()),
                    is_modifiable: true,
                    command_name: cmd_name.clone(),
                    original_text: cmd_name.map(|_| item_text.clone()),
                    line_number: None,
                });
            }
        }

        ExperienceEntry {
            title,
            company,
            location,
            start_date,
            end_date,
            bullets,
            is_current: false,
            line_number: None,
        }
    }

    fn extract_education(
        sections: &[LatexSection],
        warnings: &mut Vec<ParseWarning>,
    ) -> Vec<EducationEntry> {
        let Some(edu_section) = find_section(sections, r"education") else {
            warnings.push(ParseWarning {
                section: "education".to_string(),
                message: "no education section found".to_string(),
            });
            return Vec::new();
        };

        let from_template = Self::parse_subheading_education(&edu_section.content);
        if !from_template.is_empty() {
            return from_template;
        }

        let mut out = Vec::new();
        for (title, body) in extract_subsections(&edu_section.content) {
            let (degree, institution) = match EXPERIENCE_TITLE_PATTERN.captures(&title) {
                Some(caps) => (
                    latex_to_text(caps.get(1).unwrap().as_str()),
                    latex_to_text(caps.get(2).unwrap().as_str()),
                ),
                None => (latex_to_text(&title), String::new()),
            };
            let grad_date = DATE_PATTERN.find(&body).map(|m| m.as_str().to_string());
            out.push(EducationEntry {
                degree,
                institution,
                location: None,
                graduation_date: grad_date,
                gpa: None,
                honors: None,
                line_number: None,
            });
        }
        out
    }

    /// Parses `\resumeSubheading{institution}{location}{degree}{date}` — this template's
    /// education section uses the institution-first argument order, which differs from
    /// the experience section's title-first order above. That asymmetry is preserved
    /// deliberately rather than unified, since the two sections genuinely disagree.
    fn parse_subheading_education(content: &str) -> Vec<EducationEntry> {
        let mut education = Vec::new();

        for m in RESUME_SUBHEADING_START.find_iter(content) {
            let mut pos = char_index_of_byte(content, m.end()) - 1;
            let chars: Vec<char> = content.chars().collect();

            let (institution_text, end1) = extract_balanced_braces(content, pos);
            let institution = latex_to_text(&institution_text);
            pos = skip_whitespace(&chars, end1 + 1);

            let (location_text, end2) = extract_balanced_braces(content, pos);
            let location = latex_to_text(&location_text);
            pos = skip_whitespace(&chars, end2 + 1);

            let (degree_text, end3) = extract_balanced_braces(content, pos);
            let degree = latex_to_text(&degree_text);
            pos = skip_whitespace(&chars, end3 + 1);

            let (date_text, _) = extract_balanced_braces(content, pos);

            education.push(EducationEntry {
                degree,
                institution,
                location: Some(location),
                graduation_date: Some(date_text.trim().to_string()),
                gpa: None,
                honors: None,
                line_number: None,
            });
        }

        education
    }

    fn extract_skills(sections: &[LatexSection], warnings: &mut Vec<ParseWarning>) -> SkillsSection {
        let mut skills = SkillsSection::default();

        let Some(skills_section) = find_section(sections, r"(?:technical\s*)?skills|technologies")
        else {
            warnings.push(ParseWarning {
                section: "skills".to_string(),
                message: "no skills section found".to_string(),
            });
            return skills;
        };

        let text = latex_to_text(&skills_section.content);

        for caps in CATEGORY_LABEL_PATTERN.captures_iter(&text) {
            let category_name = caps.get(1).unwrap().as_str().trim().to_lowercase();
            let items_str = caps.get(2).unwrap().as_str().trim();
            let items: Vec<String> = items_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            if ["technical", "programming", "language", "kafka", "ecosystem"]
                .iter()
                .any(|kw| category_name.contains(kw))
            {
                skills.technical.extend(items);
            } else if ["tool", "devops", "platform", "monitoring"]
                .iter()
                .any(|kw| category_name.contains(kw))
            {
                skills.tools.extend(items);
            } else if category_name.contains("language") && !category_name.contains("programming") {
                skills.languages.extend(items);
            } else if category_name.contains("scripting") || category_name.contains("script") {
                skills.technical.extend(items);
            } else {
                skills.tools.extend(items);
            }
        }

        dedup_in_place(&mut skills.technical);
        dedup_in_place(&mut skills.tools);
        dedup_in_place(&mut skills.languages);

        skills
    }

    fn extract_projects(sections: &[LatexSection]) -> Vec<ProjectEntry> {
        let Some(proj_section) = find_section(sections, r"projects?") else {
            return Vec::new();
        };

        extract_subsections(&proj_section.content)
            .into_iter()
            .map(|(title, body)| ProjectEntry {
                name: latex_to_text(&title),
                description: latex_to_text(&body),
            })
            .collect()
    }

    fn extract_list_section(
        sections: &[LatexSection],
        pattern: &str,
        macros: &HashMap<String, MacroDefinition>,
    ) -> Vec<String> {
        let Some(section) = find_section(sections, pattern) else {
            return Vec::new();
        };

        let mut items = Vec::new();
        for block in extract_itemize_blocks(&section.content) {
            for item_text in block.items {
                let expanded = expand_text(&item_text, macros);
                let plain = latex_to_text(&expanded);
                if !plain.is_empty() {
                    items.push(plain);
                }
            }
        }

        if items.is_empty() {
            for m in ITEM_PATTERN.captures_iter(&section.content) {
                let plain = latex_to_text(m.get(1).unwrap().as_str());
                if !plain.is_empty() {
                    items.push(plain);
                }
            }
        }

        items
    }
}

fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

fn char_index_of_byte(s: &str, byte_index: usize) -> usize {
    s[..byte_index].chars().count()
}

fn char_byte_index(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

fn strip_frontmatter(content: &str) -> String {
    if !content.starts_with("---") {
        return content.to_string();
    }
    let parts: Vec<&str> = content.splitn(3, "---").collect();
    if parts.len() >= 3 {
        parts[2].trim().to_string()
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESUME: &str = r#"
\documentclass{article}
\newcommand{\resumeSubheading}[4]{}
\newcommand{\resumeItem}[1]{\item #1}

\begin{document}
\name{Jordan Rivera}
\email{jordan@example.com}

\section{Experience}
\resumeSubheading
  {Senior Backend Engineer}{Jan 2021 -- Present}{Acme Corp}{Remote}
  \begin{itemize}
    \resumeItem{Built a distributed queue that processed 2M messages daily}
    \resumeItem{Led migration of monolith to microservices, cutting latency 40%}
  \end{itemize}

\section{Education}
\resumeSubheading
  {State University}{Springfield}{B.S. Computer Science}{May 2017}

\section{Skills}
Technical: Rust, Python, Go
Tools: Docker, Kubernetes
"#;

    #[test]
    fn parses_personal_info() {
        let resume = ResumeParser::parse(SAMPLE_RESUME).unwrap();
        assert_eq!(resume.personal.name.as_deref(), Some("Jordan Rivera"));
        assert_eq!(resume.personal.email.as_deref(), Some("jordan@example.com"));
    }

    #[test]
    fn parses_experience_with_bullets() {
        let resume = ResumeParser::parse(SAMPLE_RESUME).unwrap();
        assert_eq!(resume.experience.len(), 1);
        let entry = &resume.experience[0];
        assert_eq!(entry.company, "Acme Corp");
        assert_eq!(entry.bullets.len(), 2);
        assert!(entry.bullets[0].text.contains("distributed queue"));
    }

    #[test]
    fn parses_education_with_institution_first_order() {
        let resume = ResumeParser::parse(SAMPLE_RESUME).unwrap();
        assert_eq!(resume.education.len(), 1);
        assert_eq!(resume.education[0].institution, "State University");
        assert_eq!(resume.education[0].degree, "B.S. Computer Science");
    }

    #[test]
    fn parses_skills_categories() {
        let resume = ResumeParser::parse(SAMPLE_RESUME).unwrap();
        assert!(resume.skills.technical.iter().any(|s| s == "Rust"));
        assert!(resume.skills.tools.iter().any(|s| s == "Docker"));
    }

    #[test]
    fn rejects_document_with_no_sections() {
        let err = ResumeParser::parse("just some plain text with no markers").unwrap_err();
        assert!(matches!(err, PipelineError::ParseError { .. }));
    }

    #[test]
    fn balanced_braces_handles_nesting() {
        let (content, end) = extract_balanced_braces("{outer {inner} text}", 0);
        assert_eq!(content, "outer {inner} text");
        assert_eq!(end, 20);
    }
}
