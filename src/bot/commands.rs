use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
  /// Главное меню
  Start,
  /// Каталог товаров
  Catalog,
  /// Корзина
  Cart,
  /// Частые вопросы
  Faq,
  /// Профиль и заказы
  Profile,
  /// Справка
  Help,
}
