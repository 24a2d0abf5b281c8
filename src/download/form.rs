/// The four inputs of the download form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    QueryInput,
    FormatSelect,
    NoCoverCheckbox,
    SubmitButton,
}

impl Control {
    pub const ALL: [Control; 4] = [
        Control::QueryInput,
        Control::FormatSelect,
        Control::NoCoverCheckbox,
        Control::SubmitButton,
    ];
}

pub const SUBMIT_LABEL: &str = "DOWNLOAD";
pub const WORKING_LABEL: &str = "INITIALISING...";

/// Whatever renders the download form.
pub trait FormView {
    fn set_disabled(&mut self, control: Control, disabled: bool);
    fn set_submit_label(&mut self, label: &str);
    fn clear_query(&mut self);
    fn focus_query(&mut self);
}

/// Plain form state, for front ends that draw it themselves.
#[derive(Debug, Clone)]
pub struct FormState {
    pub disabled: [bool; 4],
    pub submit_label: String,
    pub query: String,
    pub query_focused: bool,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            disabled: [false; 4],
            submit_label: SUBMIT_LABEL.to_string(),
            query: String::new(),
            query_focused: true,
        }
    }
}

impl FormState {
    pub fn any_disabled(&self) -> bool {
        self.disabled.iter().any(|d| *d)
    }

    fn slot(control: Control) -> usize {
        match control {
            Control::QueryInput => 0,
            Control::FormatSelect => 1,
            Control::NoCoverCheckbox => 2,
            Control::SubmitButton => 3,
        }
    }
}

impl FormView for FormState {
    fn set_disabled(&mut self, control: Control, disabled: bool) {
        self.disabled[Self::slot(control)] = disabled;
    }

    fn set_submit_label(&mut self, label: &str) {
        self.submit_label = label.to_string();
    }

    fn clear_query(&mut self) {
        self.query.clear();
    }

    fn focus_query(&mut self) {
        self.query_focused = true;
    }
}
