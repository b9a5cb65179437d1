use std::io::{BufRead, Write};

use crate::error::ExtractError;

/// A storefront the extracted images are published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub label: &'static str,
    /// Folder under the output root.
    pub folder: &'static str,
    /// Stem of the JSON category config.
    pub config_name: &'static str,
}

pub const TARGETS: [Target; 5] = [
    Target {
        label: "Arizona State",
        folder: "ArizonaState",
        config_name: "arizonastate",
    },
    Target {
        label: "Michigan State",
        folder: "MichiganState",
        config_name: "michiganstate",
    },
    Target {
        label: "West Virginia University",
        folder: "WestVirginiaUniversity",
        config_name: "westvirginiauniversity",
    },
    Target {
        label: "University of Pittsburgh",
        folder: "PittsburghUniversity",
        config_name: "pittsburghuniversity",
    },
    Target {
        label: "Alabama University",
        folder: "AlabamaUniversity",
        config_name: "alabamauniversity",
    },
];

/// Maps a 1-based menu choice to its target.
#[must_use]
pub fn target_for_choice(choice: &str) -> Option<&'static Target> {
    let index = choice.trim().parse::<usize>().ok()?;
    index.checked_sub(1).and_then(|index| TARGETS.get(index))
}

fn choices_hint() -> String {
    let count = TARGETS.len();
    let leading = (1..count)
        .map(|number| number.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{leading}, or {count}")
}

/// Prints the target menu and reads choices until a valid one arrives.
pub fn prompt_target<R, W>(input: &mut R, output: &mut W) -> Result<&'static Target, ExtractError>
where
    R: BufRead,
    W: Write,
{
    let rule = "=".repeat(50);
    writeln!(output, "\n{rule}")?;
    writeln!(output, "PDF IMAGE EXTRACTOR - Target Selection")?;
    writeln!(output, "{rule}")?;
    writeln!(output, "\nSelect target:")?;
    for (index, target) in TARGETS.iter().enumerate() {
        writeln!(output, "  {}. {}", index + 1, target.label)?;
    }
    writeln!(output)?;

    let hint = choices_hint();
    let mut line = String::new();
    loop {
        write!(output, "Enter your choice ({hint}): ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(ExtractError::NoTargetSelected);
        }
        if let Some(target) = target_for_choice(&line) {
            return Ok(target);
        }
        writeln!(output, "Invalid choice. Please enter {hint}.")?;
    }
}
