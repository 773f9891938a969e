use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use loan_approval::{
    Choice, CredentialStore, CreditHistory, Dependents, Education, Gender, Notice, NoticeLevel,
    Page, Predictor, PropertyArea, RawApplicant, Session, SqliteUserStore, YesNo,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;

// ============================================================================
// FORM MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Gender,
    Married,
    Dependents,
    Education,
    SelfEmployed,
    ApplicantIncome,
    LoanAmount,
    LoanAmountTerm,
    CreditHistory,
    PropertyArea,
}

impl FormField {
    pub const ALL: [FormField; 10] = [
        FormField::Gender,
        FormField::Married,
        FormField::Dependents,
        FormField::Education,
        FormField::SelfEmployed,
        FormField::ApplicantIncome,
        FormField::LoanAmount,
        FormField::LoanAmountTerm,
        FormField::CreditHistory,
        FormField::PropertyArea,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Gender => "Gender",
            FormField::Married => "Married",
            FormField::Dependents => "Dependents",
            FormField::Education => "Education",
            FormField::SelfEmployed => "Self Employed",
            FormField::ApplicantIncome => "Applicant Income",
            FormField::LoanAmount => "Loan Amount",
            FormField::LoanAmountTerm => "Loan Amount Term",
            FormField::CreditHistory => "Credit History",
            FormField::PropertyArea => "Property Area",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FormField::ApplicantIncome | FormField::LoanAmount | FormField::LoanAmountTerm
        )
    }
}

/// Step `current` by `delta` through `all`, wrapping at both ends.
fn cycle<T: Copy + PartialEq>(all: &[T], current: T, delta: isize) -> T {
    let len = all.len() as isize;
    let index = all.iter().position(|c| *c == current).unwrap_or(0) as isize;
    all[(index + delta).rem_euclid(len) as usize]
}

/// Sidebar inputs. Selects start on their first option and amounts at 0.
pub struct ApplicantForm {
    pub gender: Gender,
    pub married: YesNo,
    pub dependents: Dependents,
    pub education: Education,
    pub self_employed: YesNo,
    pub applicant_income: String,
    pub loan_amount: String,
    pub loan_amount_term: String,
    pub credit_history: CreditHistory,
    pub property_area: PropertyArea,
}

impl Default for ApplicantForm {
    fn default() -> Self {
        Self {
            gender: Gender::ALL[0],
            married: YesNo::ALL[0],
            dependents: Dependents::ALL[0],
            education: Education::ALL[0],
            self_employed: YesNo::ALL[0],
            applicant_income: "0".to_string(),
            loan_amount: "0".to_string(),
            loan_amount_term: "0".to_string(),
            credit_history: CreditHistory::ALL[0],
            property_area: PropertyArea::ALL[0],
        }
    }
}

impl ApplicantForm {
    pub fn display(&self, field: FormField) -> String {
        match field {
            FormField::Gender => self.gender.label().to_string(),
            FormField::Married => self.married.label().to_string(),
            FormField::Dependents => self.dependents.label().to_string(),
            FormField::Education => self.education.label().to_string(),
            FormField::SelfEmployed => self.self_employed.label().to_string(),
            FormField::ApplicantIncome => self.applicant_income.clone(),
            FormField::LoanAmount => self.loan_amount.clone(),
            FormField::LoanAmountTerm => self.loan_amount_term.clone(),
            FormField::CreditHistory => self.credit_history.label().to_string(),
            FormField::PropertyArea => self.property_area.label().to_string(),
        }
    }

    pub fn cycle(&mut self, field: FormField, delta: isize) {
        match field {
            FormField::Gender => self.gender = cycle(Gender::ALL, self.gender, delta),
            FormField::Married => self.married = cycle(YesNo::ALL, self.married, delta),
            FormField::Dependents => {
                self.dependents = cycle(Dependents::ALL, self.dependents, delta)
            }
            FormField::Education => self.education = cycle(Education::ALL, self.education, delta),
            FormField::SelfEmployed => {
                self.self_employed = cycle(YesNo::ALL, self.self_employed, delta)
            }
            FormField::CreditHistory => {
                self.credit_history = cycle(CreditHistory::ALL, self.credit_history, delta)
            }
            FormField::PropertyArea => {
                self.property_area = cycle(PropertyArea::ALL, self.property_area, delta)
            }
            FormField::ApplicantIncome | FormField::LoanAmount | FormField::LoanAmountTerm => {}
        }
    }

    fn input_mut(&mut self, field: FormField) -> Option<&mut String> {
        match field {
            FormField::ApplicantIncome => Some(&mut self.applicant_income),
            FormField::LoanAmount => Some(&mut self.loan_amount),
            FormField::LoanAmountTerm => Some(&mut self.loan_amount_term),
            _ => None,
        }
    }

    /// Build the raw record; an unparsable amount becomes an error notice.
    pub fn to_raw(&self) -> Result<RawApplicant, Notice> {
        let number = |field: FormField, text: &str| {
            text.trim()
                .parse::<f64>()
                .map_err(|_| Notice::error(format!("{} must be a number.", field.label())))
        };

        let record = RawApplicant {
            gender: self.gender.label().to_string(),
            married: self.married.label().to_string(),
            dependents: self.dependents.label().to_string(),
            education: self.education.label().to_string(),
            self_employed: self.self_employed.label().to_string(),
            applicant_income: number(FormField::ApplicantIncome, &self.applicant_income)?,
            loan_amount: number(FormField::LoanAmount, &self.loan_amount)?,
            loan_amount_term: number(FormField::LoanAmountTerm, &self.loan_amount_term)?,
            credit_history: self.credit_history.value(),
            property_area: self.property_area.label().to_string(),
        };
        Ok(record)
    }
}

// ============================================================================
// APP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Username,
    Password,
    Submit,
    SwitchPage,
    Field(FormField),
    Predict,
    Logout,
}

const AUTH_FOCUS: [Focus; 4] = [Focus::Username, Focus::Password, Focus::Submit, Focus::SwitchPage];

const MAIN_FOCUS: [Focus; 12] = [
    Focus::Field(FormField::Gender),
    Focus::Field(FormField::Married),
    Focus::Field(FormField::Dependents),
    Focus::Field(FormField::Education),
    Focus::Field(FormField::SelfEmployed),
    Focus::Field(FormField::ApplicantIncome),
    Focus::Field(FormField::LoanAmount),
    Focus::Field(FormField::LoanAmountTerm),
    Focus::Field(FormField::CreditHistory),
    Focus::Field(FormField::PropertyArea),
    Focus::Predict,
    Focus::Logout,
];

pub struct App<'a> {
    pub session: Session,
    store: &'a CredentialStore<SqliteUserStore>,
    predictor: &'a Predictor,
    pub username_input: String,
    pub password_input: String,
    pub form: ApplicantForm,
    pub focus: usize,
    pub notice: Option<Notice>,
    pub should_quit: bool,
}

impl<'a> App<'a> {
    pub fn new(store: &'a CredentialStore<SqliteUserStore>, predictor: &'a Predictor) -> Self {
        Self {
            session: Session::new(),
            store,
            predictor,
            username_input: String::new(),
            password_input: String::new(),
            form: ApplicantForm::default(),
            focus: 0,
            notice: None,
            should_quit: false,
        }
    }

    fn focusables(&self) -> &'static [Focus] {
        match self.session.visible_page() {
            Some(Page::Login) | Some(Page::Register) => &AUTH_FOCUS,
            Some(Page::Main) => &MAIN_FOCUS,
            None => &[],
        }
    }

    pub fn focused(&self) -> Option<Focus> {
        self.focusables().get(self.focus).copied()
    }

    fn move_focus(&mut self, delta: isize) {
        let len = self.focusables().len() as isize;
        if len == 0 {
            return;
        }
        self.focus = (self.focus as isize + delta).rem_euclid(len) as usize;
    }

    fn text_input_mut(&mut self) -> Option<&mut String> {
        match self.focused()? {
            Focus::Username => Some(&mut self.username_input),
            Focus::Password => Some(&mut self.password_input),
            Focus::Field(field) => self.form.input_mut(field),
            _ => None,
        }
    }

    // Page changed: start at the first widget with empty credentials.
    fn reset_page(&mut self) {
        self.focus = 0;
        self.username_input.clear();
        self.password_input.clear();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Tab | KeyCode::Down => self.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(-1),
            KeyCode::Left => {
                if let Some(Focus::Field(field)) = self.focused() {
                    self.form.cycle(field, -1);
                }
            }
            KeyCode::Right => {
                if let Some(Focus::Field(field)) = self.focused() {
                    self.form.cycle(field, 1);
                }
            }
            KeyCode::Enter => self.activate(),
            KeyCode::Backspace => {
                if let Some(input) = self.text_input_mut() {
                    input.pop();
                }
            }
            KeyCode::Char(c) => {
                let numeric = matches!(self.focused(), Some(Focus::Field(f)) if f.is_numeric());
                if numeric && !(c.is_ascii_digit() || c == '.' || c == '-') {
                    return;
                }
                if let Some(input) = self.text_input_mut() {
                    input.push(c);
                }
            }
            _ => {}
        }
    }

    fn activate(&mut self) {
        let Some(focus) = self.focused() else {
            return;
        };
        let page = self.session.visible_page();

        match (focus, page) {
            (Focus::Submit, Some(Page::Login)) => {
                let result = self.session.login(self.store, &self.username_input, &self.password_input);
                self.notice = Some(storage_notice(result));
                if self.session.is_logged_in() {
                    self.reset_page();
                }
            }
            (Focus::Submit, Some(Page::Register)) => {
                let result =
                    self.session.register(self.store, &self.username_input, &self.password_input);
                self.notice = Some(storage_notice(result));
                if self.session.page() == Page::Login {
                    self.reset_page();
                }
            }
            (Focus::SwitchPage, Some(Page::Login)) => {
                self.session.go_to_register();
                self.notice = None;
                self.reset_page();
            }
            (Focus::SwitchPage, Some(Page::Register)) => {
                self.session.go_to_login();
                self.notice = None;
                self.reset_page();
            }
            (Focus::Predict, Some(Page::Main)) => {
                let notice = match self.form.to_raw() {
                    Ok(raw) => self.session.predict(self.predictor, self.store, &raw),
                    Err(notice) => notice,
                };
                self.notice = Some(notice);
            }
            (Focus::Logout, Some(Page::Main)) => {
                self.session.logout();
                self.notice = None;
                self.reset_page();
            }
            _ => self.move_focus(1),
        }
    }
}

fn storage_notice(result: Result<Notice>) -> Notice {
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Credential store failure");
        Notice::error(format!("Storage error: {}", e))
    })
}

// ============================================================================
// TERMINAL LOOP
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default().fg(Color::White)
    }
}

fn button(label: &str, focused: bool) -> Span<'static> {
    let style = if focused {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan)
    };
    Span::styled(format!("[ {} ]", label), style)
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Page content
            Constraint::Length(3), // Notice
            Constraint::Length(3), // Key hints
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.session.visible_page() {
        Some(Page::Login) => render_auth(f, chunks[1], app, "Login", "Go to Register"),
        Some(Page::Register) => render_auth(f, chunks[1], app, "Register", "Go to Login"),
        Some(Page::Main) => render_main(f, chunks[1], app),
        None => {}
    }

    render_notice(f, chunks[2], app);
    render_status_bar(f, chunks[3]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let title = app
        .session
        .visible_page()
        .map(|page| page.title().to_string())
        .unwrap_or_default();

    let header = Paragraph::new(Line::from(Span::styled(
        format!(" {}", title),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_auth(f: &mut Frame, area: Rect, app: &App, submit: &str, switch: &str) {
    let focused = app.focused();
    let masked = "•".repeat(app.password_input.chars().count());

    let content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Username: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(app.username_input.clone(), focus_style(focused == Some(Focus::Username))),
            if focused == Some(Focus::Username) { Span::raw("▏") } else { Span::raw("") },
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Password: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(masked, focus_style(focused == Some(Focus::Password))),
            if focused == Some(Focus::Password) { Span::raw("▏") } else { Span::raw("") },
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            button(submit, focused == Some(Focus::Submit)),
            Span::raw("   "),
            button(switch, focused == Some(Focus::SwitchPage)),
        ]),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {} ", submit)),
    );

    f.render_widget(paragraph, area);
}

fn render_main(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(0)])
        .split(area);

    let focused = app.focused();

    let mut form_lines = vec![Line::from("")];
    for field in FormField::ALL {
        let is_focused = focused == Some(Focus::Field(field));
        let value = if field.is_numeric() {
            format!(" {} ", app.form.display(field))
        } else {
            format!("‹ {} ›", app.form.display(field))
        };
        form_lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<18}", field.label()),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(value, focus_style(is_focused)),
        ]));
    }
    form_lines.push(Line::from(""));
    form_lines.push(Line::from(vec![
        Span::raw("  "),
        button("Predict", focused == Some(Focus::Predict)),
    ]));

    let form = Paragraph::new(form_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" User Input Parameters "),
    );
    f.render_widget(form, columns[0]);

    let username = app.session.username().unwrap_or_default();
    let welcome = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("  Welcome, "),
            Span::styled(username.to_string(), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw("!"),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                "  Fill in the applicant on the left and press Predict.",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            button("Logout", focused == Some(Focus::Logout)),
        ]),
    ];

    let panel = Paragraph::new(welcome).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(panel, columns[1]);
}

fn render_notice(f: &mut Frame, area: Rect, app: &App) {
    let line = match &app.notice {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Info => Color::White,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(
                format!(" {}", notice.text),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        }
        None => Line::from(""),
    };

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let status_spans = vec![
        Span::raw(" "),
        key("Tab/↑↓"),
        Span::raw(" Move | "),
        key("←/→"),
        Span::raw(" Choose | "),
        key("Enter"),
        Span::raw(" Press | "),
        Span::styled("Esc", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use loan_approval::ForestModel;

    const DEMO_MODEL: &str = include_str!("../models/loan_forest.json");

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn focus_on(app: &mut App, target: Focus) {
        while app.focused() != Some(target) {
            press(app, KeyCode::Tab);
        }
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(cycle(PropertyArea::ALL, PropertyArea::Rural, 1), PropertyArea::Urban);
        assert_eq!(cycle(PropertyArea::ALL, PropertyArea::Urban, -1), PropertyArea::Rural);
    }

    #[test]
    fn test_form_rejects_non_numeric_amount() {
        let mut form = ApplicantForm::default();
        form.loan_amount = String::new();

        let notice = form.to_raw().unwrap_err();
        assert_eq!(notice.text, "Loan Amount must be a number.");
    }

    #[test]
    fn test_register_login_predict_logout() {
        let store = CredentialStore::new(SqliteUserStore::open_in_memory().unwrap());
        let predictor = Predictor::new(ForestModel::from_json(DEMO_MODEL).unwrap());
        let mut app = App::new(&store, &predictor);

        // Login page → Register page
        focus_on(&mut app, Focus::SwitchPage);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.visible_page(), Some(Page::Register));

        type_text(&mut app, "alice");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "pw1");
        focus_on(&mut app, Focus::Submit);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.visible_page(), Some(Page::Login));
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Success);

        type_text(&mut app, "alice");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "pw1");
        focus_on(&mut app, Focus::Submit);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.visible_page(), Some(Page::Main));

        // Amounts still at 0: rejected at the boundary
        focus_on(&mut app, Focus::Predict);
        press(&mut app, KeyCode::Enter);
        assert_eq!(
            app.notice.as_ref().unwrap().text,
            "Applicant Income must be greater than zero."
        );

        app.form.applicant_income = "6000".to_string();
        app.form.loan_amount = "150".to_string();
        app.form.loan_amount_term = "360".to_string();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.notice.as_ref().unwrap().text, "Loan Approved ✅");

        focus_on(&mut app, Focus::Logout);
        press(&mut app, KeyCode::Enter);
        assert!(!app.session.is_logged_in());
        assert_eq!(app.session.visible_page(), Some(Page::Login));
    }

    #[test]
    fn test_numeric_fields_ignore_letters() {
        let store = CredentialStore::new(SqliteUserStore::open_in_memory().unwrap());
        let predictor = Predictor::new(ForestModel::from_json(DEMO_MODEL).unwrap());
        store.register("alice", "pw1").unwrap();
        let mut app = App::new(&store, &predictor);
        app.session.login(&store, "alice", "pw1").unwrap();
        app.focus = 0;

        focus_on(&mut app, Focus::Field(FormField::LoanAmount));
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "1x5y0");
        assert_eq!(app.form.loan_amount, "150");

        focus_on(&mut app, Focus::Field(FormField::PropertyArea));
        press(&mut app, KeyCode::Right);
        assert_eq!(app.form.property_area, PropertyArea::Semiurban);
    }

    #[test]
    fn test_escape_quits() {
        let store = CredentialStore::new(SqliteUserStore::open_in_memory().unwrap());
        let predictor = Predictor::new(ForestModel::from_json(DEMO_MODEL).unwrap());
        let mut app = App::new(&store, &predictor);

        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);
    }
}
