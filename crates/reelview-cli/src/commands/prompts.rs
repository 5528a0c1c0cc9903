use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use dialoguer::{Confirm, Input, Select};

/// Prompt for a string value with optional default
pub fn prompt_string(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input_builder = Input::<String>::new().with_prompt(prompt).allow_empty(true);

    if let Some(default_value) = default {
        input_builder = input_builder.default(default_value.to_string());
    }

    input_builder
        .interact_text()
        .map_err(|e| eyre!("Failed to read input: {}", e))
}

/// Prompt for yes/no with optional default
pub fn prompt_yes_no(prompt: &str, default: Option<bool>) -> Result<bool> {
    let mut confirm_builder = Confirm::new().with_prompt(prompt);

    if let Some(default_value) = default {
        confirm_builder = confirm_builder.default(default_value);
    }

    confirm_builder
        .interact()
        .map_err(|e| eyre!("Failed to read confirmation: {}", e))
}

/// Pick one of `items`, returning its index
pub fn prompt_select(prompt: &str, items: &[&str], default: usize) -> Result<usize> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact()
        .map_err(|e| eyre!("Failed to read selection: {}", e))
}

/// Prompt for a positive number, asking again on bad input
pub fn prompt_number_with_output(prompt: &str, default: Option<u64>, output: Option<&Output>) -> Result<u64> {
    let complain = |msg: &str| match output {
        Some(out) => out.error(msg),
        None => eprintln!("{}", msg),
    };

    loop {
        let mut input_builder = Input::<String>::new().with_prompt(prompt);
        if let Some(default_value) = default {
            input_builder = input_builder.default(default_value.to_string());
        }

        let input_str = input_builder
            .interact_text()
            .map_err(|e| eyre!("Failed to read input: {}", e))?;

        let trimmed = input_str.trim();
        if trimmed.is_empty() {
            if let Some(default_value) = default {
                return Ok(default_value);
            }
            complain("Invalid input. Please enter a number.");
            continue;
        }

        match parse_positive(trimmed) {
            Some(num) => return Ok(num),
            None => complain("Invalid input. Please enter a number greater than zero."),
        }
    }
}

fn parse_positive(input: &str) -> Option<u64> {
    input.parse::<u64>().ok().filter(|n| *n > 0)
}
