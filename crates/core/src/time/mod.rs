pub mod month_end;
